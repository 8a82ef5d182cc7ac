//! Shared fixtures for the integration tests: a mock recording host serving a
//! page, a video rendition and a session archive.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Recording id used by the default fixture.
pub const RECORDING_ID: &str = "p1lecture01";

/// Page title used by the default fixture.
pub const TITLE: &str = "Intro Lecture";

pub const CAPTIONS_VTT: &str = "WEBVTT\n\n\
1\n00:00:01.000 --> 00:00:04.000\n@:@User1@:@ Welcome everyone\n\n\
2\n00:00:05.000 --> 00:00:07.000\n@:@User7@:@ Thanks\n";

pub const INDEX_STREAM: &str = "<root>\n\
<anonymousName><![CDATA[User7]]></anonymousName>\n\
<fullName><![CDATA[Sam Lee]]></fullName>\n\
</root>\n";

pub const TRANSCRIPT_STREAM: &str = "<root>\n\
<Message>[Tech - Dana Reyes] has joined the stage</Message>\n\
<Object>\n\
<iconType><![CDATA[chat]]></iconType>\n\
<label><![CDATA[Is this on the exam?]]></label>\n\
<name><![CDATA[Sam Lee]]></name>\n\
<time><![CDATA[65000]]></time>\n\
</Object>\n\
</root>\n";

pub const FILE_SHARE: &str = "<root>\n<newValue>\n\
<name><![CDATA[syllabus.pdf]]></name>\n\
<size><![CDATA[2048]]></size>\n\
<playbackFileName><![CDATA[/system/download?download-url=/_a1/p2files/output/&name=syllabus.pdf]]></playbackFileName>\n\
</newValue>\n</root>\n";

/// Builds an in-memory ZIP from `(name, content)` pairs.
pub fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();
    for (name, content) in entries {
        writer.start_file(*name, options).expect("start zip entry");
        writer
            .write_all(content.as_bytes())
            .expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// A complete session archive: captions, participant index, chat and one
/// shared document.
pub fn full_archive() -> Vec<u8> {
    build_zip(&[
        ("captions_en.vtt", CAPTIONS_VTT),
        ("indexstream.xml", INDEX_STREAM),
        ("transcriptstream.xml", TRANSCRIPT_STREAM),
        ("ftfileshare0.xml", FILE_SHARE),
    ])
}

/// Bytes that pass video validation (not HTML, above the minimum size).
pub fn video_bytes() -> Vec<u8> {
    let mut body = b"\x00\x00\x00\x18ftypmp42".to_vec();
    body.resize(8 * 1024, 0x42);
    body
}

/// Recording page HTML; `video_url` becomes the `<video src>`.
pub fn page_html(title: &str, video_url: Option<&str>) -> String {
    let video = video_url
        .map(|src| format!("<video src=\"{src}\"></video>"))
        .unwrap_or_default();
    format!(
        "<!DOCTYPE html><html><head><title>{title}</title></head>\
         <body><div id=\"player\">{video}</div></body></html>"
    )
}

/// Page URL of `id` on `server`.
pub fn recording_url(server: &MockServer, id: &str) -> String {
    format!("{}/{id}/", server.uri())
}

/// Video URL of `id` on `server`.
pub fn video_url(server: &MockServer, id: &str) -> String {
    format!("{}/media/{id}.mp4", server.uri())
}

/// Mounts the recording page.
pub async fn mount_page(server: &MockServer, id: &str, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("/{id}/")))
        .respond_with(template)
        .mount(server)
        .await;
}

/// Mounts the session archive endpoint.
pub async fn mount_archive(server: &MockServer, id: &str, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("/{id}/output/{id}.zip")))
        .respond_with(template)
        .mount(server)
        .await;
}

/// Mounts the video rendition.
pub async fn mount_video(server: &MockServer, id: &str, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("/media/{id}.mp4")))
        .respond_with(template)
        .mount(server)
        .await;
}

pub fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8")
}

pub fn zip_response(body: Vec<u8>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "application/zip")
}

pub fn video_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(video_bytes(), "video/mp4")
}

/// Serves a full recording (page with video, archive, video) for `id`.
pub async fn mount_full_recording(server: &MockServer, id: &str, title: &str) {
    let video = video_url(server, id);
    mount_page(server, id, html(page_html(title, Some(&video)))).await;
    mount_archive(server, id, zip_response(full_archive())).await;
    mount_video(server, id, video_response()).await;
}
