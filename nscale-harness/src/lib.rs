//
// Copyright (c) The nscale Contributors
//
// SPDX-License-Identifier: MIT
//

#![warn(rust_2018_idioms)]

pub mod alloc;
pub mod builder;
pub mod classifier;
pub mod consts;
pub mod debug;
pub mod error;
pub mod profile;
pub mod triggers;
pub mod validator;
pub mod verifier;
