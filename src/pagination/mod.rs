pub mod pager;

pub use pager::{Batch, CursorPager, Page, PageSource, Paginated};
