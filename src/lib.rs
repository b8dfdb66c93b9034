// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright © 2023 Adrian <adrian.eddy at gmail>

mod conversion;
mod encoder;
mod frame;
mod io;
mod types;

pub use conversion::*;
pub use encoder::*;
pub use frame::*;
pub use io::*;
pub use types::*;
