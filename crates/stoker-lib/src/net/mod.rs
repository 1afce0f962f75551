pub mod client;
pub mod downloader;

pub use client::MetadataClient;
pub use downloader::download_to_path;
