#![forbid(unsafe_code)]

pub mod folder;
pub mod ply;
pub mod txt;

pub use folder::{list_txt_files, load_and_merge_txt_folder};
pub use ply::{read_ply, write_ply, write_ply_binary};
pub use txt::{read_delimited_records, read_records, write_records, DEFAULT_PRECISION};
