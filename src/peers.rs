use crate::identity::PeerId;
use std::path::Path;

/// Load the peer manifest CSV (`ip,port` rows, header line skipped),
/// excluding `self_id` from the result.
///
/// Mirrors the upstream broker's `load_peers`: a missing or unreadable
/// manifest, or a malformed row within it, is logged and skipped rather
/// than aborting start-up — a broker with no readable peer list still
/// starts and self-elects on an empty peer set.
pub fn load_peers(path: impl AsRef<Path>, self_id: &PeerId) -> Vec<PeerId> {
    let path = path.as_ref();
    let mut reader = match csv::ReaderBuilder::new().has_headers(true).from_path(path) {
        Ok(reader) => reader,
        Err(err) => {
            log::warn!("[peers] failed to open peer manifest {}: {err}", path.display());
            return Vec::new();
        }
    };

    let mut peers = Vec::new();
    for (line_no, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                log::warn!("[peers] skipping malformed row {}: {err}", line_no + 2);
                continue;
            }
        };
        let Some(ip) = record.get(0) else {
            log::warn!("[peers] skipping row {} with no ip field", line_no + 2);
            continue;
        };
        let Some(port_field) = record.get(1) else {
            log::warn!("[peers] skipping row {} with no port field", line_no + 2);
            continue;
        };
        let Ok(port) = port_field.trim().parse::<u16>() else {
            log::warn!("[peers] skipping row {} with invalid port {port_field:?}", line_no + 2);
            continue;
        };

        let peer = PeerId::new(ip.trim(), port);
        if &peer != self_id {
            peers.push(peer);
        }
    }

    peers
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_peers_and_excludes_self() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ip,port").unwrap();
        writeln!(file, "127.0.0.1,9000").unwrap();
        writeln!(file, "127.0.0.1,9001").unwrap();
        writeln!(file, "127.0.0.1,9002").unwrap();

        let peers = load_peers(file.path(), &PeerId::new("127.0.0.1", 9001));

        assert_eq!(peers, vec![PeerId::new("127.0.0.1", 9000), PeerId::new("127.0.0.1", 9002)]);
    }

    #[test]
    fn skips_malformed_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ip,port").unwrap();
        writeln!(file, "127.0.0.1,not-a-port").unwrap();
        writeln!(file, "127.0.0.1,9005").unwrap();

        let peers = load_peers(file.path(), &PeerId::new("0.0.0.0", 0));

        assert_eq!(peers, vec![PeerId::new("127.0.0.1", 9005)]);
    }

    #[test]
    fn missing_manifest_yields_empty_peer_set() {
        let peers = load_peers("/nonexistent/path/to/peers.csv", &PeerId::new("0.0.0.0", 0));

        assert!(peers.is_empty());
    }
}
