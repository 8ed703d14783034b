use std::io::Write;

use serde::{Deserialize, Serialize};

/// Line protocol understood by the counting dashboard: one JSON object per line, tagged by
/// `"Task"`.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(tag = "Task", rename_all = "snake_case")]
pub enum TelemetryMessage {
    InitData {
        #[serde(rename = "Total")]
        total: u32,
        #[serde(rename = "Mature")]
        mature: u32,
    },
    InitLog {
        #[serde(rename = "Total")]
        total: u32,
        #[serde(rename = "Mature")]
        mature: u32,
    },
    Count,
    Clear,
}

pub trait TelemetrySink: Send {
    fn record(&mut self, message: &TelemetryMessage) -> anyhow::Result<()>;
}

pub struct JsonLinesTelemetry<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> JsonLinesTelemetry<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> TelemetrySink for JsonLinesTelemetry<W> {
    fn record(&mut self, message: &TelemetryMessage) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.out, message)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

pub struct NullTelemetry;

impl TelemetrySink for NullTelemetry {
    fn record(&mut self, _message: &TelemetryMessage) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(message: TelemetryMessage) -> String {
        let mut sink = JsonLinesTelemetry::new(Vec::new());
        sink.record(&message).unwrap();
        String::from_utf8(sink.into_inner()).unwrap()
    }

    #[test]
    fn test_wire_format() {
        assert_eq!(line(TelemetryMessage::Count), "{\"Task\":\"count\"}\n");
        assert_eq!(line(TelemetryMessage::Clear), "{\"Task\":\"clear\"}\n");
        assert_eq!(
            line(TelemetryMessage::InitData { total: 12, mature: 5 }),
            "{\"Task\":\"init_data\",\"Total\":12,\"Mature\":5}\n");
    }

    #[test]
    fn test_parses_dashboard_lines() {
        let message: TelemetryMessage =
            serde_json::from_str(r#"{"Task": "init_log", "Total": 3, "Mature": 1}"#).unwrap();
        assert_eq!(message, TelemetryMessage::InitLog { total: 3, mature: 1 });
    }
}
