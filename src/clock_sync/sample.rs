use crate::protocol::{ClockSyncRequest, ClockSyncResponse};

/// One completed request/response exchange.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncSample {
    /// Time on the wire, relay processing excluded.
    pub round_trip_ms: i64,
    /// Relay clock minus local clock; positive means the relay is ahead.
    pub offset_ms: f64,
}

/// Relay side of the exchange: echo `t1` and stamp receive / send times.
pub fn respond(request: ClockSyncRequest, t2: u64, t3: u64) -> ClockSyncResponse {
    ClockSyncResponse {
        t1: request.t1,
        t2,
        t3,
    }
}

/// Requester side: `t1` local send, `t2`/`t3` relay receive/send, `t4` local
/// receive.
///
/// `round_trip = (t4 - t1) - (t3 - t2)`,
/// `offset = ((t2 - t1) + (t3 - t4)) / 2`.
pub fn compute_sample(t1: u64, t2: u64, t3: u64, t4: u64) -> SyncSample {
    let (t1, t2, t3, t4) = (t1 as i64, t2 as i64, t3 as i64, t4 as i64);
    SyncSample {
        round_trip_ms: (t4 - t1) - (t3 - t2),
        offset_ms: ((t2 - t1) + (t3 - t4)) as f64 / 2.0,
    }
}

impl SyncSample {
    /// Builds a sample from a decoded response received at local time `t4`.
    pub fn from_response(response: &ClockSyncResponse, t4: u64) -> Self {
        compute_sample(response.t1, response.t2, response.t3, t4)
    }
}
