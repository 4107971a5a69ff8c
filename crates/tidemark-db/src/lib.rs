pub mod logger;
pub mod migration;
pub mod migrator;
pub mod record_store;
pub mod schema;
pub mod validator;
pub mod version;

pub use logger::{Logger, NilLogger, TracingLogger, WriterLogger};
pub use migration::{Migration, MigrationFn, SCHEMA_INIT_VERSION};
pub use migrator::Migrator;
pub use record_store::{MigrationRecord, RecordStore};
pub use schema::{ColumnDef, TrackingTable};
pub use version::{gen_version, gen_version_for};

pub use tidemark_common::{Error, Result};
pub use tidemark_config::Options;
