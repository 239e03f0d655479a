pub mod category;
pub mod record;
pub mod text;
pub mod time_serde;

pub use category::CategoryFamily;
pub use record::{ChangeCursor, ChangeEntry, ChangesPage, ListPage, MetadataRecord};
