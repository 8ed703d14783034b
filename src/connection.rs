use log::{info, warn};
use thiserror::Error;

#[derive(Error, Debug)]
#[error("no reachable {device} ({})", describe_attempts(.attempts))]
pub struct ConnectionError {
    pub device: &'static str,
    /// `(endpoint, reason)` for every candidate that was tried.
    pub attempts: Vec<(String, String)>,
}

fn describe_attempts(attempts: &[(String, String)]) -> String {
    if attempts.is_empty() {
        return "no candidate endpoints configured".to_owned();
    }
    attempts.iter()
        .map(|(endpoint, reason)| format!("{endpoint}: {reason}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Tries each candidate in order and keeps the first that connects.
pub fn resolve_first<T>(
    device: &'static str,
    candidates: &[String],
    mut connect: impl FnMut(&str) -> anyhow::Result<T>,
) -> Result<(String, T), ConnectionError> {
    let mut attempts = Vec::with_capacity(candidates.len());
    for endpoint in candidates {
        match connect(endpoint) {
            Ok(handle) => {
                info!("Connected {device} at {endpoint}");
                return Ok((endpoint.clone(), handle));
            }
            Err(e) => {
                warn!("Failed to connect {device} at {endpoint}: {e:#}");
                attempts.push((endpoint.clone(), format!("{e:#}")));
            }
        }
    }
    Err(ConnectionError { device, attempts })
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    fn ports(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_first_success_wins() {
        let mut tried = vec![];
        let (endpoint, handle) = resolve_first("board", &ports(&["/dev/ttyACM0", "/dev/ttyACM1", "/dev/ttyACM2"]), |e| {
            tried.push(e.to_owned());
            if e == "/dev/ttyACM0" { Err(anyhow!("busy")) } else { Ok(e.len()) }
        }).unwrap();
        assert_eq!(endpoint, "/dev/ttyACM1");
        assert_eq!(handle, 12);
        assert_eq!(tried, ports(&["/dev/ttyACM0", "/dev/ttyACM1"]));
    }

    #[test]
    fn test_all_failures_are_aggregated() {
        let err = resolve_first::<()>("board", &ports(&["a", "b"]), |e| Err(anyhow!("no device at {e}")))
            .unwrap_err();
        assert_eq!(err.attempts.len(), 2);
        let msg = err.to_string();
        assert!(msg.contains("no reachable board"), "{msg}");
        assert!(msg.contains("a: no device at a") && msg.contains("b: no device at b"), "{msg}");
    }

    #[test]
    fn test_no_candidates() {
        let err = resolve_first::<()>("arm", &[], |_| Ok(())).unwrap_err();
        assert!(err.to_string().contains("no candidate endpoints"));
    }
}
