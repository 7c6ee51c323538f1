//
// Copyright (c) The nscale Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use derive_new::new;
use nscale_utils::Receiver;
use serde::{Deserialize, Serialize};

use crate::error::PingError;

// One echo reply received from the probed address.
#[derive(Clone, Copy, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PingReply {
    pub seq: u32,
    pub source: IpAddr,
    pub rtt: Duration,
}

// Reachability prober running on the device.
//
// A probe streams its replies over the returned channel and closes it
// once the requested echo count has been sent. A probe that elicits no
// reply at all yields an empty stream, not an error; errors are
// reserved for destinations the device has no route toward.
#[async_trait]
pub trait PingClient: Send + Sync {
    async fn ping(
        &self,
        dst: IpAddr,
        count: u32,
    ) -> Result<Receiver<PingReply>, PingError>;
}
