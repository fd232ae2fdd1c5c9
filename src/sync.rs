//! Telemetry / camera-GPS pairing.
//!
//! The onboard camera unit publishes its own GPS fixes so video frames
//! can be lined up with car telemetry. Both streams are kept in short
//! bounded buffers and the newest packets are paired on request.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SYNC_BUFFER_CAPACITY: usize = 100;

/// GPS packet from the camera unit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PiGpsPacket {
    pub latitude: f64,
    pub longitude: f64,
    pub speed_kmh: f64,
    pub heading: f64,
    pub altitude: f64,
    pub satellites: u32,
    pub fix_quality: u32,
    pub gps_timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Received<T> {
    pub packet: T,
    pub received_ms: f64,
}

/// Newest telemetry paired with the newest camera fix, if any.
#[derive(Debug, Clone, Copy)]
pub struct SyncedPacket<'a> {
    pub telemetry: &'a Received<Value>,
    pub pi_gps: Option<&'a Received<PiGpsPacket>>,
}

#[derive(Debug, Clone)]
pub struct SyncBuffer {
    telemetry: VecDeque<Received<Value>>,
    pi_gps: VecDeque<Received<PiGpsPacket>>,
    capacity: usize,
}

impl Default for SyncBuffer {
    fn default() -> Self {
        Self::new(SYNC_BUFFER_CAPACITY)
    }
}

impl SyncBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            telemetry: VecDeque::new(),
            pi_gps: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn add_telemetry(&mut self, packet: Value, received_ms: f64) {
        push_bounded(&mut self.telemetry, Received { packet, received_ms }, self.capacity);
    }

    pub fn add_pi_gps(&mut self, packet: PiGpsPacket, received_ms: f64) {
        push_bounded(&mut self.pi_gps, Received { packet, received_ms }, self.capacity);
    }

    pub fn telemetry_len(&self) -> usize {
        self.telemetry.len()
    }

    pub fn pi_gps_len(&self) -> usize {
        self.pi_gps.len()
    }

    /// Pair the newest packets. None until telemetry has arrived.
    pub fn latest(&self) -> Option<SyncedPacket<'_>> {
        Some(SyncedPacket {
            telemetry: self.telemetry.back()?,
            pi_gps: self.pi_gps.back(),
        })
    }
}

fn push_bounded<T>(buf: &mut VecDeque<T>, item: T, capacity: usize) {
    if buf.len() == capacity {
        buf.pop_front();
    }
    buf.push_back(item);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn buffers_are_bounded() {
        let mut sync = SyncBuffer::default();
        for i in 0..150 {
            sync.add_telemetry(json!({"seq": i}), i as f64);
            sync.add_pi_gps(PiGpsPacket::default(), i as f64);
        }
        assert_eq!(sync.telemetry_len(), 100);
        assert_eq!(sync.pi_gps_len(), 100);
    }

    #[test]
    fn latest_pairs_newest_packets() {
        let mut sync = SyncBuffer::default();
        assert!(sync.latest().is_none());

        sync.add_pi_gps(PiGpsPacket { latitude: 25.49, ..Default::default() }, 5.0);
        assert!(sync.latest().is_none());

        sync.add_telemetry(json!({"seq": 1}), 10.0);
        sync.add_telemetry(json!({"seq": 2}), 20.0);

        let synced = sync.latest().unwrap();
        assert_eq!(synced.telemetry.packet["seq"], 2);
        assert_eq!(synced.pi_gps.unwrap().packet.latitude, 25.49);
    }

    #[test]
    fn pi_gps_packet_tolerates_missing_fields() {
        let packet: PiGpsPacket =
            serde_json::from_str(r#"{"latitude": 25.49, "longitude": 51.45, "satellites": 9}"#).unwrap();
        assert_eq!(packet.satellites, 9);
        assert_eq!(packet.gps_timestamp, None);
    }
}
