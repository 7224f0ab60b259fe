use serde_json::Value;

use crate::{
    common::types::{Container, watch_url},
    sources::{
        classify::UpstreamError,
        format::AudioFormat,
        models::{SearchResult, VideoDetails},
    },
};

/// Video results of an InnerTube search response, in the order returned.
pub fn extract_search_results(response: &Value) -> Vec<SearchResult> {
    let mut results = Vec::new();

    if let Some(section_list) = find_section_list(response) {
        if let Some(contents) = section_list.get("contents").and_then(|c| c.as_array()) {
            for section in contents {
                if let Some(items) = section
                    .get("itemSectionRenderer")
                    .and_then(|i| i.get("contents"))
                    .and_then(|c| c.as_array())
                {
                    results.extend(items.iter().filter_map(extract_search_result));
                }
            }
        }
    }

    results
}

pub fn find_section_list(value: &Value) -> Option<&Value> {
    if let Some(list) = value.get("sectionListRenderer") {
        return Some(list);
    }
    if let Some(contents) = value.get("contents") {
        if let Some(list) = find_section_list(contents) {
            return Some(list);
        }
    }
    if let Some(arr) = value.as_array() {
        for item in arr {
            if let Some(list) = find_section_list(item) {
                return Some(list);
            }
        }
    }
    if let Some(primary) = value
        .get("twoColumnSearchResultsRenderer")
        .and_then(|t| t.get("primaryContents"))
    {
        return find_section_list(primary);
    }
    None
}

/// Maps a `videoRenderer` item. Channels, playlists, shelves and ads yield `None`.
pub fn extract_search_result(item: &Value) -> Option<SearchResult> {
    let renderer = item
        .get("videoRenderer")
        .or_else(|| item.get("compactVideoRenderer"))?;

    let video_id = renderer.get("videoId").and_then(|v| v.as_str())?;
    let title = get_text(renderer.get("title")?)?;
    if video_id.is_empty() || title.is_empty() {
        return None;
    }

    let duration = if is_live(renderer) {
        "LIVE".to_string()
    } else {
        renderer
            .get("lengthText")
            .and_then(get_text)
            .unwrap_or_default()
    };

    Some(SearchResult {
        id: video_id.to_string(),
        title,
        thumbnail: get_thumbnail(renderer),
        duration,
        url: watch_url(video_id),
    })
}

fn is_live(renderer: &Value) -> bool {
    renderer
        .get("isLive")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
        || renderer
            .get("badges")
            .and_then(|b| b.as_array())
            .map(|arr| {
                arr.iter().any(|badge| {
                    badge
                        .get("metadataBadgeRenderer")
                        .and_then(|mbr| mbr.get("style"))
                        .and_then(|l| l.as_str())
                        .map(|s| s == "BADGE_STYLE_TYPE_LIVE_NOW")
                        .unwrap_or(false)
                })
            })
            .unwrap_or(false)
}

/// Title and audio-capable formats from a `/player` response.
///
/// A non-OK `playabilityStatus` becomes a classified [`UpstreamError`].
/// Formats without a plain `url` (signature-ciphered) are skipped; if that
/// leaves nothing while the response did list formats, the client is
/// reported as unusable so the caller can try the next one.
pub fn extract_video_details(
    body: &Value,
    video_id: &str,
    user_agent: &str,
) -> Result<VideoDetails, UpstreamError> {
    let playability = body.get("playabilityStatus");
    let status = playability
        .and_then(|p| p.get("status"))
        .and_then(|s| s.as_str())
        .unwrap_or("UNKNOWN");
    if status != "OK" {
        let reason = playability
            .and_then(|p| p.get("reason"))
            .and_then(|r| r.as_str());
        return Err(UpstreamError::from_playability(status, reason));
    }

    let details = body.get("videoDetails");
    let title = details
        .and_then(|d| d.get("title"))
        .and_then(|t| t.as_str())
        .unwrap_or(video_id)
        .to_string();
    let author = details
        .and_then(|d| d.get("author"))
        .and_then(|a| a.as_str())
        .map(str::to_string);
    let length_seconds = details
        .and_then(|d| d.get("lengthSeconds"))
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<u64>().ok());

    let streaming_data = body
        .get("streamingData")
        .ok_or_else(|| UpstreamError::other(format!("no streamingData for {}", video_id)))?;

    let raw: Vec<&Value> = ["adaptiveFormats", "formats"]
        .iter()
        .filter_map(|key| streaming_data.get(*key).and_then(|v| v.as_array()))
        .flatten()
        .collect();

    let formats: Vec<AudioFormat> = raw
        .iter()
        .filter_map(|f| extract_format(f, user_agent))
        .collect();

    if formats.is_empty() && !raw.is_empty() {
        return Err(UpstreamError::other(format!(
            "all {} formats for {} require signature deciphering",
            raw.len(),
            video_id
        )));
    }

    Ok(VideoDetails {
        id: video_id.to_string(),
        title,
        author,
        length_seconds,
        formats,
    })
}

fn extract_format(f: &Value, user_agent: &str) -> Option<AudioFormat> {
    let url = f.get("url").and_then(|u| u.as_str())?;
    let mime_type = f.get("mimeType").and_then(|m| m.as_str())?;
    let itag = f.get("itag").and_then(|v| v.as_i64()).unwrap_or(-1);

    // Muxed formats carry both an audio and a video codec.
    let has_video = mime_type.starts_with("video/");
    let audio_only = mime_type.starts_with("audio/")
        || (!has_video && f.get("audioQuality").is_some() && f.get("width").is_none());

    let bitrate = f
        .get("bitrate")
        .or_else(|| f.get("averageBitrate"))
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    let content_length = f
        .get("contentLength")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<u64>().ok());

    Some(AudioFormat {
        id: itag.to_string(),
        mime_type: mime_type.to_string(),
        container: Container::from_mime(mime_type),
        codecs: parse_codecs(mime_type),
        bitrate,
        content_length,
        audio_only,
        url: url.to_string(),
        user_agent: Some(user_agent.to_string()),
    })
}

/// `audio/webm; codecs="opus"` → `opus`.
fn parse_codecs(mime_type: &str) -> Option<String> {
    let (_, rest) = mime_type.split_once("codecs=")?;
    let codecs = rest.trim().trim_matches('"');
    (!codecs.is_empty()).then(|| codecs.to_string())
}

pub fn get_text(obj: &Value) -> Option<String> {
    if let Some(s) = obj.as_str() {
        return Some(s.to_string());
    }
    if let Some(simple_text) = obj.get("simpleText").and_then(|v| v.as_str()) {
        return Some(simple_text.to_string());
    }
    if let Some(runs) = obj.get("runs").and_then(|v| v.as_array()) {
        let mut text = String::new();
        for run in runs {
            if let Some(t) = run.get("text").and_then(|v| v.as_str()) {
                text.push_str(t);
            }
        }
        return Some(text);
    }
    None
}

fn get_thumbnail(renderer: &Value) -> Option<String> {
    renderer
        .get("thumbnail")
        .and_then(|t| t.get("thumbnails"))
        .and_then(|arr| arr.as_array())
        .and_then(|arr| arr.last()) // Get highest quality
        .and_then(|thumb| thumb.get("url"))
        .and_then(|url| url.as_str())
        .map(|s| s.split('?').next().unwrap_or(s).to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::sources::classify::UpstreamKind;

    fn video(id: &str, title: &str, length: Option<&str>) -> Value {
        let mut renderer = json!({
            "videoId": id,
            "title": { "runs": [{ "text": title }] },
            "thumbnail": { "thumbnails": [
                { "url": format!("https://i.ytimg.com/vi/{id}/default.jpg") },
                { "url": format!("https://i.ytimg.com/vi/{id}/hq720.jpg?sqp=abc") }
            ]}
        });
        if let Some(length) = length {
            renderer["lengthText"] = json!({ "simpleText": length });
        }
        json!({ "videoRenderer": renderer })
    }

    fn search_response(items: Vec<Value>) -> Value {
        json!({
            "contents": {
                "twoColumnSearchResultsRenderer": {
                    "primaryContents": {
                        "sectionListRenderer": {
                            "contents": [
                                { "itemSectionRenderer": { "contents": items } },
                                { "continuationItemRenderer": {} }
                            ]
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn search_keeps_order_and_skips_non_videos() {
        let response = search_response(vec![
            video("aaaaaaaaaaa", "First", Some("3:32")),
            json!({ "channelRenderer": { "channelId": "UC123" } }),
            video("bbbbbbbbbbb", "Second", None),
        ]);
        let results = extract_search_results(&response);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "aaaaaaaaaaa");
        assert_eq!(results[0].duration, "3:32");
        assert_eq!(
            results[0].thumbnail.as_deref(),
            Some("https://i.ytimg.com/vi/aaaaaaaaaaa/hq720.jpg")
        );
        assert_eq!(results[0].url, "https://www.youtube.com/watch?v=aaaaaaaaaaa");
        assert_eq!(results[1].title, "Second");
        assert_eq!(results[1].duration, "");
    }

    #[test]
    fn live_videos_report_live_duration() {
        let mut item = video("ccccccccccc", "Radio", None);
        item["videoRenderer"]["badges"] = json!([
            { "metadataBadgeRenderer": { "style": "BADGE_STYLE_TYPE_LIVE_NOW", "label": "LIVE" } }
        ]);
        assert_eq!(extract_search_result(&item).unwrap().duration, "LIVE");
    }

    #[test]
    fn missing_thumbnail_is_none() {
        let item = json!({ "videoRenderer": {
            "videoId": "ddddddddddd",
            "title": { "simpleText": "No thumb" }
        }});
        assert!(extract_search_result(&item).unwrap().thumbnail.is_none());
    }

    fn player(status: &str, formats: Value) -> Value {
        json!({
            "playabilityStatus": { "status": status, "reason": "Sign in to confirm your age" },
            "videoDetails": { "title": "Song", "author": "Artist", "lengthSeconds": "212" },
            "streamingData": { "adaptiveFormats": formats }
        })
    }

    #[test]
    fn player_formats_are_extracted() {
        let body = player(
            "OK",
            json!([
                { "itag": 137, "mimeType": "video/mp4; codecs=\"avc1.640028\"", "bitrate": 4000000,
                  "width": 1920, "url": "https://rr.googlevideo.com/v" },
                { "itag": 251, "mimeType": "audio/webm; codecs=\"opus\"", "bitrate": 160000,
                  "contentLength": "3456789", "audioQuality": "AUDIO_QUALITY_MEDIUM",
                  "url": "https://rr.googlevideo.com/a" },
                { "itag": 140, "mimeType": "audio/mp4; codecs=\"mp4a.40.2\"", "bitrate": 130000,
                  "signatureCipher": "s=abc&url=https%3A%2F%2Fx" }
            ]),
        );
        let details = extract_video_details(&body, "eeeeeeeeeee", "ua/1").unwrap();
        assert_eq!(details.title, "Song");
        assert_eq!(details.author.as_deref(), Some("Artist"));
        assert_eq!(details.length_seconds, Some(212));
        assert_eq!(details.formats.len(), 2);

        let audio = &details.formats[1];
        assert_eq!(audio.id, "251");
        assert!(audio.audio_only);
        assert_eq!(audio.container, Container::Webm);
        assert_eq!(audio.codecs.as_deref(), Some("opus"));
        assert_eq!(audio.content_length, Some(3_456_789));
        assert_eq!(audio.user_agent.as_deref(), Some("ua/1"));
        assert!(!details.formats[0].audio_only);
    }

    #[test]
    fn unplayable_video_is_classified() {
        let err = extract_video_details(&player("LOGIN_REQUIRED", json!([])), "x", "ua")
            .unwrap_err();
        assert_eq!(err.kind, UpstreamKind::Blocked);
    }

    #[test]
    fn ciphered_only_formats_are_an_error() {
        let body = player(
            "OK",
            json!([{ "itag": 251, "mimeType": "audio/webm", "signatureCipher": "s=1&url=x" }]),
        );
        let err = extract_video_details(&body, "x", "ua").unwrap_err();
        assert_eq!(err.kind, UpstreamKind::Other);
    }
}
