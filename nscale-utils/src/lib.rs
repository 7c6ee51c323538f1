//
// Copyright (c) The nscale Contributors
//
// SPDX-License-Identifier: MIT
//

#![warn(rust_2018_idioms)]

pub mod addr;
pub mod mac_addr;
pub mod task;

pub type Receiver<T> = tokio::sync::mpsc::Receiver<T>;
