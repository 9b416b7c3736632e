pub mod models;
pub mod traits;
pub mod ytdlp;

pub use models::{
    DownloadRequest, DownloadedMedia, ExtractorOptions, Format, Postprocess, VideoInfo,
};
pub use traits::Extractor;
pub use ytdlp::YtDlpExtractor;
