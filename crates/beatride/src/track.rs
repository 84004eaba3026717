//! Track documents: plain-text polylines that levels ride along.
//!
//! One segment per line as `x,y,z:yaw` (yaw in degrees); `#` starts a
//! comment; blank lines are fine. Malformed lines are logged and skipped so
//! a half-edited document still loads.

use glam::Vec3;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackSegment {
    pub position: Vec3,
    pub yaw_degrees: f32,
}

pub fn parse_track(text: &str) -> Vec<TrackSegment> {
    let mut segments = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        match parse_segment(line) {
            Some(segment) => segments.push(segment),
            None => warn!(line = index + 1, content = line, "skipping malformed track line"),
        }
    }
    segments
}

fn parse_segment(line: &str) -> Option<TrackSegment> {
    let (coords, yaw) = line.split_once(':')?;
    let mut parts = coords.split(',');
    let x: f32 = parts.next()?.trim().parse().ok()?;
    let y: f32 = parts.next()?.trim().parse().ok()?;
    let z: f32 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let yaw_degrees: f32 = yaw.trim().parse().ok()?;
    Some(TrackSegment {
        position: Vec3::new(x, y, z),
        yaw_degrees,
    })
}

/// Interpolated sample `beat` segments along the track; the ride loops back
/// through the closing segment. Empty tracks have no ride position.
pub fn ride_at(segments: &[TrackSegment], beat: f32) -> Option<TrackSegment> {
    let first = *segments.first()?;
    if segments.len() == 1 {
        return Some(first);
    }
    let span = segments.len() as f32;
    let beat = beat.rem_euclid(span);
    let index = (beat.floor() as usize).min(segments.len() - 1);
    let next = (index + 1) % segments.len();
    let t = beat - beat.floor();
    let a = segments[index];
    let b = segments[next];
    Some(TrackSegment {
        position: a.position.lerp(b.position, t),
        yaw_degrees: a.yaw_degrees + (b.yaw_degrees - a.yaw_degrees) * t,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_segments_and_skips_comments() {
        let doc = "\
# demo track
0, 0, 0 : 0
1,0,-2:15   # bend right

2,1,-4:30
";
        let segments = parse_track(doc);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].position, Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(segments[1].position, Vec3::new(1.0, 0.0, -2.0));
        assert_eq!(segments[1].yaw_degrees, 15.0);
        assert_eq!(segments[2].yaw_degrees, 30.0);
    }

    #[test]
    fn malformed_lines_are_skipped_not_fatal() {
        let doc = "\
0,0,0:0
not a segment
1,2:90
1,2,3,4:90
2,0,-2:45
";
        let segments = parse_track(doc);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].yaw_degrees, 45.0);
    }

    #[test]
    fn ride_interpolates_between_segments() {
        let segments = parse_track("0,0,0:0\n2,0,-4:90\n");
        let mid = ride_at(&segments, 0.5).expect("ride position");
        assert_eq!(mid.position, Vec3::new(1.0, 0.0, -2.0));
        assert_eq!(mid.yaw_degrees, 45.0);
    }

    #[test]
    fn ride_loops_past_the_last_segment() {
        let segments = parse_track("0,0,0:0\n4,0,0:0\n");
        let wrapped = ride_at(&segments, 2.25).expect("ride position");
        let fresh = ride_at(&segments, 0.25).expect("ride position");
        assert_eq!(wrapped.position, fresh.position);
    }

    #[test]
    fn empty_track_has_no_ride_position() {
        assert!(ride_at(&[], 3.0).is_none());
        let single = parse_track("5,1,2:180\n");
        let fixed = ride_at(&single, 9.9).expect("ride position");
        assert_eq!(fixed.position, Vec3::new(5.0, 1.0, 2.0));
    }
}
