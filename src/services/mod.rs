pub mod archive;
pub mod downloader;
pub mod upstream;
