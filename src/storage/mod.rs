pub mod record;

pub use record::RecordWriter;
