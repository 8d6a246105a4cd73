//! Dotted-segment topic pattern matching: `*` matches exactly one segment,
//! `**` matches one or more segments and may appear anywhere in the
//! pattern (`a.**.d` is valid, not just a trailing wildcard), and a literal
//! segment matches case-sensitively.

/// Whether `topic` (e.g. `system.cpu`) matches `pattern` (e.g. `system.**`).
pub fn matches(pattern: &str, topic: &str) -> bool {
    let pat_segments: Vec<&str> = pattern.split('.').collect();
    let topic_segments: Vec<&str> = topic.split('.').collect();
    match_segments(&pat_segments, &topic_segments)
}

fn match_segments(pattern: &[&str], topic: &[&str]) -> bool {
    match pattern.first() {
        None => topic.is_empty(),
        Some(&"**") => {
            if topic.is_empty() {
                return false;
            }
            // Greedy with backtracking: `**` must consume at least one
            // segment, but how many depends on what follows it in the
            // pattern (e.g. the trailing `d` in `a.**.d`).
            (1..=topic.len()).any(|take| match_segments(&pattern[1..], &topic[take..]))
        }
        Some(&"*") => !topic.is_empty() && match_segments(&pattern[1..], &topic[1..]),
        Some(seg) => !topic.is_empty() && *seg == topic[0] && match_segments(&pattern[1..], &topic[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_star_alone_matches_every_topic() {
        assert!(matches("**", "a"));
        assert!(matches("**", "a.b.c"));
    }

    #[test]
    fn single_star_matches_exactly_one_segment() {
        assert!(matches("*", "a"));
        assert!(!matches("*", "a.b"));
        assert!(!matches("*", ""));
    }

    #[test]
    fn literal_pattern_matches_only_the_exact_topic() {
        assert!(matches("system.cpu", "system.cpu"));
        assert!(!matches("system.cpu", "system.memory"));
        assert!(!matches("system.cpu", "system.cpu.load"));
    }

    #[test]
    fn double_star_anchored_inside_the_pattern() {
        assert!(matches("a.**.d", "a.b.d"));
        assert!(matches("a.**.d", "a.b.c.d"));
        assert!(!matches("a.**.d", "a.d")); // ** requires at least one segment
        assert!(!matches("a.**.d", "a.b.c"));
    }

    #[test]
    fn system_star_star_matches_nested_system_topics() {
        assert!(matches("system.**", "system.cpu"));
        assert!(matches("system.**", "system.cpu.load"));
        assert!(!matches("system.**", "network.cpu"));
    }
}
