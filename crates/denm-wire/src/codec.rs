//! Message codec
//!
//! The service only talks to the [`Codec`] trait. [`BinaryCodec`] is a
//! compact little-endian format:
//!
//! ```text
//! header (6) | mgmt presence (1) | action id (8) | detection (8) | reference (8)
//!   | position (21) | station type (1) | optional mgmt fields
//!   | situation? | location? | alacarte?
//! ```
//!
//! Each container starts with its own presence byte. Counts of repeated
//! elements are one byte. Encoding enforces the ETSI size limits and decoding
//! rejects anything a well-formed peer could not have produced.

use bytes::{BufMut, Bytes, BytesMut};
use denm_core::{
    ActionId, Alacarte, Altitude, CauseCode, DeltaReferencePosition, DenmError, DenmResult,
    EventPoint, Heading, Location, PathPoint, PosConfidenceEllipse, ReferencePosition, RoadWorks,
    Situation, Speed, StationId, StationType, StationaryVehicle, Termination, TimestampIts,
    MAX_VALIDITY_SECS,
};

use crate::{
    parse_header, write_header, DenmMessage, ManagementContainer, PresenceFlags, DENM_MESSAGE_ID,
    HEADER_SIZE,
};

/// Maximum event history length
pub const MAX_EVENT_HISTORY: usize = 23;

/// Maximum number of traces in the location container
pub const MAX_TRACES: usize = 7;

/// Maximum number of points in one trace
pub const MAX_PATH_POINTS: usize = 40;

/// Maximum number of referenced DENMs in road works
pub const MAX_REFERENCE_DENMS: usize = 8;

/// Smallest possible encoded message (no optional fields)
pub const MIN_MESSAGE_SIZE: usize = HEADER_SIZE + 1 + 8 + 8 + 8 + POSITION_SIZE + 1;

const POSITION_SIZE: usize = 4 + 4 + 2 + 2 + 2 + 4 + 1;

const MGMT_ALLOWED: u8 = 0xFF;

// Situation container
const SIT_LINKED_CAUSE: u8 = 0x01;
const SIT_ALLOWED: u8 = SIT_LINKED_CAUSE;

// Location container
const LOC_SPEED: u8 = 0x01;
const LOC_HEADING: u8 = 0x02;
const LOC_ROAD_TYPE: u8 = 0x04;
const LOC_ALLOWED: u8 = LOC_SPEED | LOC_HEADING | LOC_ROAD_TYPE;

// A-la-carte container
const ALC_LANE_POSITION: u8 = 0x01;
const ALC_EXTERNAL_TEMPERATURE: u8 = 0x02;
const ALC_POSITIONING_SOLUTION: u8 = 0x04;
const ALC_ROAD_WORKS: u8 = 0x08;
const ALC_STATIONARY_VEHICLE: u8 = 0x10;
const ALC_ALLOWED: u8 = 0x1F;

// Road works
const RW_LIGHT_BAR: u8 = 0x01;
const RW_SPEED_LIMIT: u8 = 0x02;
const RW_TRAFFIC_FLOW_RULE: u8 = 0x04;
const RW_CAUSE: u8 = 0x08;
const RW_ALLOWED: u8 = 0x0F;

// Stationary vehicle
const SV_SINCE: u8 = 0x01;
const SV_CAUSE: u8 = 0x02;
const SV_OCCUPANTS: u8 = 0x04;
const SV_ENERGY_STORAGE: u8 = 0x08;
const SV_ALLOWED: u8 = 0x0F;

/// Encoder/decoder seam between the service and the wire format
pub trait Codec: Send + Sync {
    /// Encode a message; fails with `EncodeError` on constraint violations
    fn encode(&self, msg: &DenmMessage) -> DenmResult<Bytes>;

    /// Decode a message; fails without partial output on malformed input
    fn decode(&self, buf: &[u8]) -> DenmResult<DenmMessage>;
}

/// Compact little-endian binary codec
#[derive(Clone, Copy, Debug, Default)]
pub struct BinaryCodec;

impl BinaryCodec {
    pub fn new() -> Self {
        BinaryCodec
    }
}

impl Codec for BinaryCodec {
    fn encode(&self, msg: &DenmMessage) -> DenmResult<Bytes> {
        check_constraints(msg)?;

        let mut buf = BytesMut::with_capacity(MIN_MESSAGE_SIZE + 64);
        write_header(&msg.header, &mut buf);
        write_management(msg, &mut buf);

        if let Some(situation) = &msg.situation {
            write_situation(situation, &mut buf);
        }
        if let Some(location) = &msg.location {
            write_location(location, &mut buf);
        }
        if let Some(alacarte) = &msg.alacarte {
            write_alacarte(alacarte, &mut buf);
        }

        Ok(buf.freeze())
    }

    fn decode(&self, buf: &[u8]) -> DenmResult<DenmMessage> {
        let header = parse_header(buf)?;
        if header.message_id != DENM_MESSAGE_ID {
            return Err(DenmError::UnexpectedMessageId(header.message_id));
        }

        let mut reader = WireReader::new(&buf[HEADER_SIZE..]);
        let (management, presence) = read_management(&mut reader)?;

        let situation = if presence.has(PresenceFlags::SITUATION) {
            Some(read_situation(&mut reader)?)
        } else {
            None
        };
        let location = if presence.has(PresenceFlags::LOCATION) {
            Some(read_location(&mut reader)?)
        } else {
            None
        };
        let alacarte = if presence.has(PresenceFlags::ALACARTE) {
            Some(read_alacarte(&mut reader)?)
        } else {
            None
        };

        if reader.remaining() != 0 {
            return Err(DenmError::InvalidWireFormat(format!(
                "{} trailing bytes",
                reader.remaining()
            )));
        }

        Ok(DenmMessage {
            header,
            management,
            situation,
            location,
            alacarte,
        })
    }
}

/// Check ETSI size limits before anything is written
pub fn check_constraints(msg: &DenmMessage) -> DenmResult<()> {
    if let Some(validity) = msg.management.validity_duration {
        if validity > MAX_VALIDITY_SECS {
            return Err(DenmError::EncodeError(format!(
                "validity duration {} exceeds {}",
                validity, MAX_VALIDITY_SECS
            )));
        }
    }

    if let Some(situation) = &msg.situation {
        ensure_len("event history", situation.event_history.len(), MAX_EVENT_HISTORY)?;
    }

    if let Some(location) = &msg.location {
        ensure_len("traces", location.traces.len(), MAX_TRACES)?;
        for trace in &location.traces {
            ensure_len("trace points", trace.len(), MAX_PATH_POINTS)?;
        }
    }

    if let Some(road_works) = msg.alacarte.as_ref().and_then(|a| a.road_works.as_ref()) {
        ensure_len(
            "reference denms",
            road_works.reference_denms.len(),
            MAX_REFERENCE_DENMS,
        )?;
    }

    Ok(())
}

fn ensure_len(what: &str, len: usize, max: usize) -> DenmResult<()> {
    if len > max {
        return Err(DenmError::EncodeError(format!(
            "{}: {} elements exceeds {}",
            what, len, max
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

fn write_management(msg: &DenmMessage, buf: &mut BytesMut) {
    let mgmt = &msg.management;
    let presence = PresenceFlags::from_fields(&[
        (PresenceFlags::TERMINATION, mgmt.termination.is_some()),
        (PresenceFlags::RELEVANCE_DISTANCE, mgmt.relevance_distance.is_some()),
        (
            PresenceFlags::RELEVANCE_TRAFFIC_DIRECTION,
            mgmt.relevance_traffic_direction.is_some(),
        ),
        (PresenceFlags::VALIDITY_DURATION, mgmt.validity_duration.is_some()),
        (
            PresenceFlags::TRANSMISSION_INTERVAL,
            mgmt.transmission_interval.is_some(),
        ),
        (PresenceFlags::SITUATION, msg.situation.is_some()),
        (PresenceFlags::LOCATION, msg.location.is_some()),
        (PresenceFlags::ALACARTE, msg.alacarte.is_some()),
    ]);
    buf.put_u8(presence.0);

    buf.put_u32_le(mgmt.action_id.originating_station.0);
    buf.put_u32_le(mgmt.action_id.sequence_number);
    buf.put_u64_le(mgmt.detection_time.as_millis());
    buf.put_u64_le(mgmt.reference_time.as_millis());
    write_position(&mgmt.event_position, buf);
    buf.put_u8(mgmt.station_type.to_byte());

    if let Some(termination) = mgmt.termination {
        buf.put_u8(termination.to_byte());
    }
    if let Some(distance) = mgmt.relevance_distance {
        buf.put_u8(distance);
    }
    if let Some(direction) = mgmt.relevance_traffic_direction {
        buf.put_u8(direction);
    }
    if let Some(validity) = mgmt.validity_duration {
        buf.put_u32_le(validity);
    }
    if let Some(interval) = mgmt.transmission_interval {
        buf.put_u16_le(interval);
    }
}

fn write_position(pos: &ReferencePosition, buf: &mut BytesMut) {
    buf.put_i32_le(pos.latitude);
    buf.put_i32_le(pos.longitude);
    buf.put_u16_le(pos.confidence.semi_major_confidence);
    buf.put_u16_le(pos.confidence.semi_minor_confidence);
    buf.put_u16_le(pos.confidence.semi_major_orientation);
    buf.put_i32_le(pos.altitude.value);
    buf.put_u8(pos.altitude.confidence);
}

fn write_delta(delta: &DeltaReferencePosition, buf: &mut BytesMut) {
    buf.put_i32_le(delta.delta_latitude);
    buf.put_i32_le(delta.delta_longitude);
    buf.put_i16_le(delta.delta_altitude);
}

fn write_opt_u16(value: Option<u16>, buf: &mut BytesMut) {
    match value {
        Some(v) => {
            buf.put_u8(1);
            buf.put_u16_le(v);
        }
        None => buf.put_u8(0),
    }
}

fn write_cause(cause: CauseCode, buf: &mut BytesMut) {
    buf.put_u8(cause.cause);
    buf.put_u8(cause.sub_cause);
}

fn write_situation(situation: &Situation, buf: &mut BytesMut) {
    let presence = PresenceFlags::from_fields(&[(SIT_LINKED_CAUSE, situation.linked_cause.is_some())]);
    buf.put_u8(presence.0);
    buf.put_u8(situation.information_quality);
    write_cause(situation.event_type, buf);
    if let Some(linked) = situation.linked_cause {
        write_cause(linked, buf);
    }

    buf.put_u8(situation.event_history.len() as u8);
    for point in &situation.event_history {
        write_delta(&point.position, buf);
        write_opt_u16(point.delta_time, buf);
        buf.put_u8(point.information_quality);
    }
}

fn write_location(location: &Location, buf: &mut BytesMut) {
    let presence = PresenceFlags::from_fields(&[
        (LOC_SPEED, location.event_speed.is_some()),
        (LOC_HEADING, location.event_position_heading.is_some()),
        (LOC_ROAD_TYPE, location.road_type.is_some()),
    ]);
    buf.put_u8(presence.0);

    if let Some(speed) = location.event_speed {
        buf.put_u16_le(speed.value);
        buf.put_u8(speed.confidence);
    }
    if let Some(heading) = location.event_position_heading {
        buf.put_u16_le(heading.value);
        buf.put_u8(heading.confidence);
    }

    buf.put_u8(location.traces.len() as u8);
    for trace in &location.traces {
        buf.put_u8(trace.len() as u8);
        for point in trace {
            write_delta(&point.position, buf);
            write_opt_u16(point.delta_time, buf);
        }
    }

    if let Some(road_type) = location.road_type {
        buf.put_u8(road_type);
    }
}

fn write_alacarte(alacarte: &Alacarte, buf: &mut BytesMut) {
    let presence = PresenceFlags::from_fields(&[
        (ALC_LANE_POSITION, alacarte.lane_position.is_some()),
        (ALC_EXTERNAL_TEMPERATURE, alacarte.external_temperature.is_some()),
        (ALC_POSITIONING_SOLUTION, alacarte.positioning_solution.is_some()),
        (ALC_ROAD_WORKS, alacarte.road_works.is_some()),
        (ALC_STATIONARY_VEHICLE, alacarte.stationary_vehicle.is_some()),
    ]);
    buf.put_u8(presence.0);

    if let Some(lane) = alacarte.lane_position {
        buf.put_i8(lane);
    }
    if let Some(temperature) = alacarte.external_temperature {
        buf.put_i8(temperature);
    }
    if let Some(solution) = alacarte.positioning_solution {
        buf.put_u8(solution);
    }
    if let Some(rw) = &alacarte.road_works {
        write_road_works(rw, buf);
    }
    if let Some(sv) = &alacarte.stationary_vehicle {
        write_stationary_vehicle(sv, buf);
    }
}

fn write_road_works(rw: &RoadWorks, buf: &mut BytesMut) {
    let presence = PresenceFlags::from_fields(&[
        (RW_LIGHT_BAR, rw.light_bar_siren_in_use.is_some()),
        (RW_SPEED_LIMIT, rw.speed_limit.is_some()),
        (RW_TRAFFIC_FLOW_RULE, rw.traffic_flow_rule.is_some()),
        (RW_CAUSE, rw.cause.is_some()),
    ]);
    buf.put_u8(presence.0);

    if let Some(v) = rw.light_bar_siren_in_use {
        buf.put_u8(v);
    }
    if let Some(v) = rw.speed_limit {
        buf.put_u8(v);
    }
    if let Some(v) = rw.traffic_flow_rule {
        buf.put_u8(v);
    }
    if let Some(cause) = rw.cause {
        write_cause(cause, buf);
    }

    buf.put_u8(rw.reference_denms.len() as u8);
    for id in &rw.reference_denms {
        buf.put_u32_le(id.originating_station.0);
        buf.put_u32_le(id.sequence_number);
    }
}

fn write_stationary_vehicle(sv: &StationaryVehicle, buf: &mut BytesMut) {
    let presence = PresenceFlags::from_fields(&[
        (SV_SINCE, sv.stationary_since.is_some()),
        (SV_CAUSE, sv.cause.is_some()),
        (SV_OCCUPANTS, sv.number_of_occupants.is_some()),
        (SV_ENERGY_STORAGE, sv.energy_storage_type.is_some()),
    ]);
    buf.put_u8(presence.0);

    if let Some(v) = sv.stationary_since {
        buf.put_u8(v);
    }
    if let Some(cause) = sv.cause {
        write_cause(cause, buf);
    }
    if let Some(v) = sv.number_of_occupants {
        buf.put_u8(v);
    }
    if let Some(v) = sv.energy_storage_type {
        buf.put_u8(v);
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Bounds-checked cursor over an input buffer
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        WireReader { buf, pos: 0 }
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Take the next `n` bytes
    pub fn take(&mut self, n: usize) -> DenmResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(DenmError::BufferTooShort {
                expected: self.pos + n,
                actual: self.buf.len(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> DenmResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> DenmResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn i8(&mut self) -> DenmResult<i8> {
        Ok(self.u8()? as i8)
    }

    pub fn u16(&mut self) -> DenmResult<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn i16(&mut self) -> DenmResult<i16> {
        Ok(i16::from_le_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> DenmResult<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn i32(&mut self) -> DenmResult<i32> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> DenmResult<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    /// Read a presence byte, rejecting bits outside `allowed`
    pub fn presence(&mut self, allowed: u8, what: &str) -> DenmResult<PresenceFlags> {
        let flags = PresenceFlags::new(self.u8()?);
        let unknown = flags.unknown_bits(allowed);
        if unknown != 0 {
            return Err(DenmError::InvalidWireFormat(format!(
                "{}: unknown presence bits {:#04x}",
                what, unknown
            )));
        }
        Ok(flags)
    }

    /// Read a repeated-element count, rejecting counts above `max`
    pub fn count(&mut self, max: usize, what: &str) -> DenmResult<usize> {
        let n = self.u8()? as usize;
        if n > max {
            return Err(DenmError::InvalidWireFormat(format!(
                "{}: {} elements exceeds {}",
                what, n, max
            )));
        }
        Ok(n)
    }

    fn opt_u16(&mut self) -> DenmResult<Option<u16>> {
        match self.u8()? {
            0 => Ok(None),
            1 => Ok(Some(self.u16()?)),
            other => Err(DenmError::InvalidWireFormat(format!(
                "invalid option tag {}",
                other
            ))),
        }
    }
}

fn read_management(r: &mut WireReader<'_>) -> DenmResult<(ManagementContainer, PresenceFlags)> {
    let presence = r.presence(MGMT_ALLOWED, "management")?;

    let action_id = ActionId::new(StationId::new(r.u32()?), r.u32()?);
    let detection_time = TimestampIts::from_millis(r.u64()?);
    let reference_time = TimestampIts::from_millis(r.u64()?);
    let event_position = read_position(r)?;
    let station_type_byte = r.u8()?;
    let station_type = StationType::from_byte(station_type_byte).ok_or_else(|| {
        DenmError::InvalidWireFormat(format!("unknown station type {}", station_type_byte))
    })?;

    let termination = if presence.has(PresenceFlags::TERMINATION) {
        let b = r.u8()?;
        Some(Termination::from_byte(b).ok_or_else(|| {
            DenmError::InvalidWireFormat(format!("unknown termination {}", b))
        })?)
    } else {
        None
    };
    let relevance_distance = if presence.has(PresenceFlags::RELEVANCE_DISTANCE) {
        Some(r.u8()?)
    } else {
        None
    };
    let relevance_traffic_direction = if presence.has(PresenceFlags::RELEVANCE_TRAFFIC_DIRECTION) {
        Some(r.u8()?)
    } else {
        None
    };
    let validity_duration = if presence.has(PresenceFlags::VALIDITY_DURATION) {
        let v = r.u32()?;
        if v > MAX_VALIDITY_SECS {
            return Err(DenmError::InvalidWireFormat(format!(
                "validity duration {} exceeds {}",
                v, MAX_VALIDITY_SECS
            )));
        }
        Some(v)
    } else {
        None
    };
    let transmission_interval = if presence.has(PresenceFlags::TRANSMISSION_INTERVAL) {
        Some(r.u16()?)
    } else {
        None
    };

    let management = ManagementContainer {
        action_id,
        detection_time,
        reference_time,
        termination,
        event_position,
        relevance_distance,
        relevance_traffic_direction,
        validity_duration,
        transmission_interval,
        station_type,
    };
    Ok((management, presence))
}

fn read_position(r: &mut WireReader<'_>) -> DenmResult<ReferencePosition> {
    Ok(ReferencePosition {
        latitude: r.i32()?,
        longitude: r.i32()?,
        confidence: PosConfidenceEllipse {
            semi_major_confidence: r.u16()?,
            semi_minor_confidence: r.u16()?,
            semi_major_orientation: r.u16()?,
        },
        altitude: Altitude {
            value: r.i32()?,
            confidence: r.u8()?,
        },
    })
}

fn read_delta(r: &mut WireReader<'_>) -> DenmResult<DeltaReferencePosition> {
    Ok(DeltaReferencePosition {
        delta_latitude: r.i32()?,
        delta_longitude: r.i32()?,
        delta_altitude: r.i16()?,
    })
}

fn read_cause(r: &mut WireReader<'_>) -> DenmResult<CauseCode> {
    Ok(CauseCode::new(r.u8()?, r.u8()?))
}

fn read_situation(r: &mut WireReader<'_>) -> DenmResult<Situation> {
    let presence = r.presence(SIT_ALLOWED, "situation")?;
    let information_quality = r.u8()?;
    let event_type = read_cause(r)?;
    let linked_cause = if presence.has(SIT_LINKED_CAUSE) {
        Some(read_cause(r)?)
    } else {
        None
    };

    let n = r.count(MAX_EVENT_HISTORY, "event history")?;
    let mut event_history = Vec::with_capacity(n);
    for _ in 0..n {
        event_history.push(EventPoint {
            position: read_delta(r)?,
            delta_time: r.opt_u16()?,
            information_quality: r.u8()?,
        });
    }

    Ok(Situation {
        information_quality,
        event_type,
        linked_cause,
        event_history,
    })
}

fn read_location(r: &mut WireReader<'_>) -> DenmResult<Location> {
    let presence = r.presence(LOC_ALLOWED, "location")?;

    let event_speed = if presence.has(LOC_SPEED) {
        Some(Speed {
            value: r.u16()?,
            confidence: r.u8()?,
        })
    } else {
        None
    };
    let event_position_heading = if presence.has(LOC_HEADING) {
        Some(Heading {
            value: r.u16()?,
            confidence: r.u8()?,
        })
    } else {
        None
    };

    let n_traces = r.count(MAX_TRACES, "traces")?;
    let mut traces = Vec::with_capacity(n_traces);
    for _ in 0..n_traces {
        let n_points = r.count(MAX_PATH_POINTS, "trace points")?;
        let mut trace = Vec::with_capacity(n_points);
        for _ in 0..n_points {
            trace.push(PathPoint {
                position: read_delta(r)?,
                delta_time: r.opt_u16()?,
            });
        }
        traces.push(trace);
    }

    let road_type = if presence.has(LOC_ROAD_TYPE) {
        Some(r.u8()?)
    } else {
        None
    };

    Ok(Location {
        event_speed,
        event_position_heading,
        traces,
        road_type,
    })
}

fn read_alacarte(r: &mut WireReader<'_>) -> DenmResult<Alacarte> {
    let presence = r.presence(ALC_ALLOWED, "alacarte")?;

    let lane_position = if presence.has(ALC_LANE_POSITION) {
        Some(r.i8()?)
    } else {
        None
    };
    let external_temperature = if presence.has(ALC_EXTERNAL_TEMPERATURE) {
        Some(r.i8()?)
    } else {
        None
    };
    let positioning_solution = if presence.has(ALC_POSITIONING_SOLUTION) {
        Some(r.u8()?)
    } else {
        None
    };
    let road_works = if presence.has(ALC_ROAD_WORKS) {
        Some(read_road_works(r)?)
    } else {
        None
    };
    let stationary_vehicle = if presence.has(ALC_STATIONARY_VEHICLE) {
        Some(read_stationary_vehicle(r)?)
    } else {
        None
    };

    Ok(Alacarte {
        lane_position,
        external_temperature,
        positioning_solution,
        road_works,
        stationary_vehicle,
    })
}

fn read_road_works(r: &mut WireReader<'_>) -> DenmResult<RoadWorks> {
    let presence = r.presence(RW_ALLOWED, "road works")?;
    let light_bar_siren_in_use = if presence.has(RW_LIGHT_BAR) { Some(r.u8()?) } else { None };
    let speed_limit = if presence.has(RW_SPEED_LIMIT) { Some(r.u8()?) } else { None };
    let traffic_flow_rule = if presence.has(RW_TRAFFIC_FLOW_RULE) { Some(r.u8()?) } else { None };
    let cause = if presence.has(RW_CAUSE) { Some(read_cause(r)?) } else { None };

    let n = r.count(MAX_REFERENCE_DENMS, "reference denms")?;
    let mut reference_denms = Vec::with_capacity(n);
    for _ in 0..n {
        reference_denms.push(ActionId::new(StationId::new(r.u32()?), r.u32()?));
    }

    Ok(RoadWorks {
        light_bar_siren_in_use,
        speed_limit,
        traffic_flow_rule,
        cause,
        reference_denms,
    })
}

fn read_stationary_vehicle(r: &mut WireReader<'_>) -> DenmResult<StationaryVehicle> {
    let presence = r.presence(SV_ALLOWED, "stationary vehicle")?;
    Ok(StationaryVehicle {
        stationary_since: if presence.has(SV_SINCE) { Some(r.u8()?) } else { None },
        cause: if presence.has(SV_CAUSE) { Some(read_cause(r)?) } else { None },
        number_of_occupants: if presence.has(SV_OCCUPANTS) { Some(r.u8()?) } else { None },
        energy_storage_type: if presence.has(SV_ENERGY_STORAGE) { Some(r.u8()?) } else { None },
    })
}
