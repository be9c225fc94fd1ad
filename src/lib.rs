mod banner;
mod batch;
mod config;
mod error;
mod font;
mod layout;
mod pdf;
pub mod qr;
mod record;
mod render;
mod runlog;
mod summary;
mod types;

pub use banner::BannerImage;
pub use batch::{BatchOptions, run_batch, run_batch_with_options};
pub use config::{CardConfig, Palette};
pub use error::CardstockError;
pub use font::{FontHandle, FontResolver, FontWeight};
pub use layout::{CardLayout, CardZones, LayoutResult, compute_zones, layout_card};
pub use pdf::{package_card, pdf_bytes};
pub use qr::QrBitmap;
pub use record::{MemberRecord, identifier_digest, identifier_suffix, sanitize_name};
pub use render::{RenderedCard, render};
pub use runlog::RunLogger;
pub use summary::{RecordEntry, RecordStatus, RunSummary};
pub use types::{Color, Pt, PxRect, Size};
