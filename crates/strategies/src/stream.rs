use alphabot_core::Timestamp;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("telemetry write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("telemetry encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Shape of the values published on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    /// Frame delimiter carrying only the timestamp.
    Marker,
    Ohlc,
    Float,
    /// Float drawn as bars (volumes).
    FloatBar,
}

/// A named telemetry channel. `pane` is the chart index the channel is drawn on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamMember {
    pub name: &'static str,
    pub kind: MemberKind,
    pub pane: u8,
}

impl StreamMember {
    pub fn marker(name: &'static str) -> Self {
        Self {
            name,
            kind: MemberKind::Marker,
            pane: 0,
        }
    }

    pub fn ohlc(name: &'static str) -> Self {
        Self {
            name,
            kind: MemberKind::Ohlc,
            pane: 0,
        }
    }

    pub fn float(name: &'static str, pane: u8) -> Self {
        Self {
            name,
            kind: MemberKind::Float,
            pane,
        }
    }

    pub fn float_bar(name: &'static str, pane: u8) -> Self {
        Self {
            name,
            kind: MemberKind::FloatBar,
            pane,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StreamValue {
    Timestamp(Timestamp),
    Float(#[serde(with = "rust_decimal::serde::float")] Decimal),
    Ohlc(#[serde(with = "ohlc_floats")] [Decimal; 4]),
}

mod ohlc_floats {
    use rust_decimal::prelude::ToPrimitive;
    use rust_decimal::Decimal;
    use serde::ser::SerializeTuple;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(values: &[Decimal; 4], serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(4)?;
        for value in values {
            tuple.serialize_element(&value.to_f64().unwrap_or(f64::NAN))?;
        }
        tuple.end()
    }
}

/// One pushed frame: every channel updated since the previous push.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreamFrame {
    pub timestamp: Timestamp,
    pub values: BTreeMap<&'static str, StreamValue>,
}

/// Sink of per-candle telemetry with its own cursor.
pub trait Streamer {
    fn add_member(&mut self, member: StreamMember);

    fn members(&self) -> &[StreamMember];

    /// Update a channel of the frame being built.
    fn update(&mut self, name: &'static str, value: StreamValue, timestamp: Timestamp);

    /// Flush the frame being built.
    fn push(&mut self) -> Result<(), StreamError>;

    /// Timestamp up to which the sink already received data.
    fn next_timestamp(&self) -> Timestamp;

    fn set_next_timestamp(&mut self, timestamp: Timestamp);
}

/// Frame buffer shared by the sinks below.
#[derive(Debug, Clone, Default)]
struct FrameBuilder {
    members: Vec<StreamMember>,
    current: StreamFrame,
}

impl FrameBuilder {
    fn update(&mut self, name: &'static str, value: StreamValue, timestamp: Timestamp) {
        if !self.members.iter().any(|m| m.name == name) {
            tracing::trace!(channel = name, "update on undeclared telemetry channel");
            return;
        }
        self.current.timestamp = timestamp;
        self.current.values.insert(name, value);
    }

    fn take(&mut self) -> StreamFrame {
        std::mem::take(&mut self.current)
    }
}

/// Keeps pushed frames in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStreamer {
    builder: FrameBuilder,
    next_timestamp: Timestamp,
    pub frames: Vec<StreamFrame>,
}

impl MemoryStreamer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Streamer for MemoryStreamer {
    fn add_member(&mut self, member: StreamMember) {
        self.builder.members.push(member);
    }

    fn members(&self) -> &[StreamMember] {
        &self.builder.members
    }

    fn update(&mut self, name: &'static str, value: StreamValue, timestamp: Timestamp) {
        self.builder.update(name, value, timestamp);
    }

    fn push(&mut self) -> Result<(), StreamError> {
        let frame = self.builder.take();
        self.frames.push(frame);
        Ok(())
    }

    fn next_timestamp(&self) -> Timestamp {
        self.next_timestamp
    }

    fn set_next_timestamp(&mut self, timestamp: Timestamp) {
        self.next_timestamp = timestamp;
    }
}

/// Writes one JSON object per pushed frame, newline separated.
#[derive(Debug)]
pub struct JsonLinesStreamer<W: Write> {
    builder: FrameBuilder,
    next_timestamp: Timestamp,
    writer: W,
}

impl<W: Write> JsonLinesStreamer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            builder: FrameBuilder::default(),
            next_timestamp: 0,
            writer,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Streamer for JsonLinesStreamer<W> {
    fn add_member(&mut self, member: StreamMember) {
        self.builder.members.push(member);
    }

    fn members(&self) -> &[StreamMember] {
        &self.builder.members
    }

    fn update(&mut self, name: &'static str, value: StreamValue, timestamp: Timestamp) {
        self.builder.update(name, value, timestamp);
    }

    fn push(&mut self) -> Result<(), StreamError> {
        let frame = self.builder.take();
        serde_json::to_writer(&mut self.writer, &frame)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    fn next_timestamp(&self) -> Timestamp {
        self.next_timestamp
    }

    fn set_next_timestamp(&mut self, timestamp: Timestamp) {
        self.next_timestamp = timestamp;
    }
}
