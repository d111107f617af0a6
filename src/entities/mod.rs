pub mod analysis_job;
pub mod score_result;
pub mod user;
pub mod video;

pub use analysis_job::Entity as AnalysisJob;
pub use score_result::Entity as ScoreResult;
pub use user::Entity as User;
pub use video::Entity as Video;
