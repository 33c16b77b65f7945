// 1. Traits
pub use crate::report::io::{Report, ReportName, ToCsv, ToJson, ToSchema};
pub use crate::report::polars_ext::{DataFrameExt, ExprExt};

// 2. Pipeline
pub use crate::data::loader::{RawObservations, load_observations};
pub use crate::data::schema::ObservationCol;
pub use crate::pipeline::{clean, derive_metrics, filter_project, prepare, prepare_frame};

// 3. Reports
pub use crate::report::export::{ExportedReports, export_reports};
pub use crate::report::insights::{EntityRate, Insights};
pub use crate::report::observations::{LatestSnapshot, ObservationTable};
pub use crate::report::summary::{SummaryCol, SummaryStatistics};
pub use crate::report::trends::CaseTrend;

// 4. Errors
pub use crate::error::{ConfigError, DataError, IoError, TrackerError, TrackerResult};

// 5. Configs
pub use crate::config::TrackerConfig;
