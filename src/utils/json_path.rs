//! Dot-path lookup over vendor JSON.
//!
//! Vendor payloads drift: the same image may sit at `images[0].url` in one
//! release and `image.url` in the next. Adapters list every known location as
//! a path and take the first hit, so an unknown shape degrades to "no result"
//! instead of a parse failure.
//!
//! Supported syntax:
//! - Nested keys (`a.b.c`)
//! - Array indexing (`choices[0].message.images[0]`), also as `choices.0`
//! - `[*]` / `*` for the first element of an array

use serde_json::Value;

/// Stateless path evaluator.
pub struct PathMapper;

impl PathMapper {
    /// Get value from JSON using dot-notation path (supports array indexing)
    ///
    /// Examples:
    /// - "images[0].url"
    /// - "output.image_base64"
    /// - "response.generatedVideos[0].video.uri"
    pub fn get_path<'a>(obj: &'a Value, path: &str) -> Option<&'a Value> {
        let normalized = path.trim().trim_start_matches("$.");
        if normalized.is_empty() {
            return None;
        }
        let mut current = obj;

        for part in normalized.split('.') {
            if part.is_empty() {
                return None;
            }

            if let Some(bracket_pos) = part.find('[') {
                let key = &part[..bracket_pos];
                if !key.is_empty() {
                    current = current.as_object()?.get(key)?;
                }
                // One or more trailing indexes, e.g. "grid[0][1]".
                for idx in part[bracket_pos..].split('[').skip(1) {
                    current = Self::index(current, idx.trim_end_matches(']'))?;
                }
            } else {
                current = match current {
                    Value::Object(map) => map.get(part)?,
                    Value::Array(_) => Self::index(current, part)?,
                    _ => return None,
                };
            }
        }

        Some(current)
    }

    fn index<'a>(value: &'a Value, idx: &str) -> Option<&'a Value> {
        let arr = value.as_array()?;
        if idx == "*" {
            arr.first()
        } else {
            arr.get(idx.parse::<usize>().ok()?)
        }
    }

    /// Non-empty string at `path`.
    pub fn get_str<'a>(obj: &'a Value, path: &str) -> Option<&'a str> {
        Self::get_path(obj, path)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// First non-empty string across an ordered list of paths, with the
    /// index of the path that matched.
    pub fn first_str<'a>(obj: &'a Value, paths: &[&str]) -> Option<(usize, &'a str)> {
        paths
            .iter()
            .enumerate()
            .find_map(|(i, p)| Self::get_str(obj, p).map(|s| (i, s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_and_indexed() {
        let v = json!({
            "choices": [{"message": {"images": [{"image_url": {"url": "data:image/png;base64,AAA"}}]}}],
            "grid": [[1, 2], [3, 4]]
        });
        assert_eq!(
            PathMapper::get_str(&v, "choices[0].message.images[0].image_url.url"),
            Some("data:image/png;base64,AAA")
        );
        assert_eq!(
            PathMapper::get_str(&v, "choices.0.message.images.*.image_url.url"),
            Some("data:image/png;base64,AAA")
        );
        assert_eq!(PathMapper::get_path(&v, "grid[1][0]"), Some(&json!(3)));
        assert_eq!(PathMapper::get_path(&v, "$.grid[*][1]"), Some(&json!(2)));
    }

    #[test]
    fn misses_are_none() {
        let v = json!({"images": [], "video": {"url": ""}});
        assert_eq!(PathMapper::get_path(&v, "images[0].url"), None);
        assert_eq!(PathMapper::get_str(&v, "video.url"), None);
        assert_eq!(PathMapper::get_path(&v, ""), None);
        assert_eq!(PathMapper::get_path(&v, "images..url"), None);
        assert_eq!(PathMapper::get_path(&v, "images[x]"), None);
    }

    #[test]
    fn first_str_respects_order() {
        let v = json!({"image": {"url": "b"}, "images": [{"url": "a"}]});
        assert_eq!(
            PathMapper::first_str(&v, &["images[0].url", "image.url"]),
            Some((0, "a"))
        );
        assert_eq!(
            PathMapper::first_str(&v, &["output[0]", "image.url"]),
            Some((1, "b"))
        );
        assert_eq!(PathMapper::first_str(&v, &["nope"]), None);
    }
}
