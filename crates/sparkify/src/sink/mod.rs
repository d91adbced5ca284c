//! Output side: Arrow layout, Parquet encoding, partitioned table writes and
//! reads.

pub mod parquet;
pub mod reader;
pub mod table;
pub mod writer;

pub use self::parquet::{FinishedFile, ParquetWriterConfig};
pub use reader::{read_table, row_count};
pub use table::{ARTISTS, SONGPLAYS, SONGS, TIME, TableRow, TableSpec, USERS};
pub use writer::{PartitionedWriter, SUCCESS_MARKER, TableWriteStats};
