use std::path::PathBuf;

use crate::search::Step;

pub const DB_FILE: &str = "world.db";

pub fn default_db_path() -> PathBuf {
    PathBuf::from(DB_FILE)
}

/// One line per step, transports annotated.
pub fn format_path(steps: &[Step]) -> String {
    let mut out = String::new();
    for (i, s) in steps.iter().enumerate() {
        out.push_str(&format!("{:>4}  {}", i + 1, s.position));
        if let Some(t) = &s.transport {
            out.push_str(&format!("  via {} #{} ({} ticks)", t.kind, t.id, t.duration));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::PositionId;
    use crate::transport::Transport;

    #[test]
    fn format_path_marks_transports() {
        let a = PositionId::new(1, 2, 0);
        let b = PositionId::new(9, 9, 1);
        let steps = vec![Step::walk(a), Step { position: b, transport: Some(Transport::new(3, a, b, 2)) }];
        let text = format_path(&steps);
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("(1, 2, 0)"));
        assert!(text.contains("via other #3 (2 ticks)"));
    }
}
