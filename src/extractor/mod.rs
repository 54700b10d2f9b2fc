mod models;
mod ytdlp;

use futures::stream::BoxStream;

pub use models::{ExtractPlan, ExtractorConfig};
pub use ytdlp::{ExtractError, Result, YtDlp};

/// Seam between the workflow and the external extraction tool.
/// Implementations resolve the URL, write their output into `plan.dest_dir`,
/// and report progress ratios in `0.0..=1.0` as the stream items. An `Err`
/// item means the tool itself failed; a stream that ends without one means
/// the tool believes it succeeded.
pub trait MediaExtractor: Clone + Send + Sync + 'static {
    fn extract(&self, plan: ExtractPlan) -> BoxStream<'static, Result<f32>>;
}
