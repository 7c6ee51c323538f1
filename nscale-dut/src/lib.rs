//
// Copyright (c) The nscale Contributors
//
// SPDX-License-Identifier: MIT
//

#![warn(rust_2018_idioms)]
#![cfg_attr(
    feature = "testing",
    allow(dead_code, unused_variables, unused_imports)
)]

pub mod config;
pub mod error;
pub mod path;
pub mod ping;
pub mod store;
#[cfg(feature = "testing")]
pub mod stub;
pub mod telemetry;
pub mod topology;
