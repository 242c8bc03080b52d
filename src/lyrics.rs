//! LRC lyric parsing.

/// A single timed lyric line: (offset in seconds, text).
pub type LyricLine = (f32, String);

/// Parse LRC-formatted lyrics into `(seconds, text)` pairs sorted by time.
///
/// Handles `[mm:ss.xx]` and `[mm:ss.xxx]` tags, multiple tags on one line,
/// and skips metadata lines like `[ar: ...]`. Lines with a time tag but no
/// text (instrumental breaks) become `"..."`.
pub fn parse_lrc(text: &str) -> Vec<LyricLine> {
    let mut lines: Vec<LyricLine> = Vec::new();

    for raw in text.lines() {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let mut tags: Vec<f32> = Vec::new();
        let mut rest = raw;

        // Consume leading time tags; anything after the last one is the text.
        while let Some(start) = rest.find('[') {
            if start != 0 {
                break;
            }
            let Some(end) = rest.find(']') else { break };
            match parse_time_tag(&rest[1..end]) {
                Some(secs) => {
                    tags.push(secs);
                    rest = rest[end + 1..].trim_start();
                }
                // Metadata tag ([ar:..], [ti:..]) — not a lyric line.
                None => break,
            }
        }

        if tags.is_empty() {
            continue;
        }

        let lyric = rest.trim();
        let lyric = if lyric.is_empty() { "..." } else { lyric };
        for secs in tags {
            lines.push((secs, lyric.to_string()));
        }
    }

    lines.sort_by(|a, b| a.0.total_cmp(&b.0));
    lines
}

/// Parse the inside of a `[mm:ss.xx]` tag. Returns `None` for metadata tags.
fn parse_time_tag(tag: &str) -> Option<f32> {
    let (minutes, rest) = tag.split_once(':')?;
    let minutes: u32 = minutes.parse().ok()?;

    let (seconds, frac) = match rest.split_once('.') {
        Some((s, f)) => (s, Some(f)),
        None => (rest, None),
    };
    let seconds: u32 = seconds.parse().ok()?;

    let fraction = match frac {
        Some(f) if f.len() == 2 => f.parse::<u32>().ok()? as f32 / 100.0,
        Some(f) if f.len() == 3 => f.parse::<u32>().ok()? as f32 / 1000.0,
        Some(_) => return None,
        None => 0.0,
    };

    Some(minutes as f32 * 60.0 + seconds as f32 + fraction)
}

/// Pick the lyric line active at `elapsed` seconds, if any.
pub fn line_at(lines: &[LyricLine], elapsed: f32) -> Option<&str> {
    lines
        .iter()
        .take_while(|(t, _)| *t <= elapsed)
        .last()
        .map(|(_, text)| text.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_sorts_timestamps() {
        let lrc = "[00:22.50]Second\n[00:20.15]First\n";
        let lines = parse_lrc(lrc);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].1, "First");
        assert!((lines[0].0 - 20.15).abs() < 0.001);
        assert_eq!(lines[1].1, "Second");
    }

    #[test]
    fn repeated_tags_expand_to_multiple_lines() {
        let lrc = "[01:05.30][00:25.00]Chorus";
        let lines = parse_lrc(lrc);
        assert_eq!(lines.len(), 2);
        assert!((lines[0].0 - 25.0).abs() < 0.001);
        assert!((lines[1].0 - 65.3).abs() < 0.001);
        assert!(lines.iter().all(|(_, t)| t == "Chorus"));
    }

    #[test]
    fn skips_metadata_and_fills_instrumental_lines() {
        let lrc = "[ar: Artist]\n[ti: Title]\n[00:30.10]\n[00:32.00]la la";
        let lines = parse_lrc(lrc);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].1, "...");
        assert_eq!(lines[1].1, "la la");
    }

    #[test]
    fn millisecond_precision_tags() {
        let lines = parse_lrc("[00:10.500]Half");
        assert!((lines[0].0 - 10.5).abs() < 0.001);
    }

    #[test]
    fn line_at_returns_latest_elapsed_line() {
        let lines = parse_lrc("[00:10.00]A\n[00:20.00]B");
        assert_eq!(line_at(&lines, 5.0), None);
        assert_eq!(line_at(&lines, 12.0), Some("A"));
        assert_eq!(line_at(&lines, 25.0), Some("B"));
    }
}
