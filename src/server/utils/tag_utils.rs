// tags for downloaded tracks, written straight into each container
//
// mp3 gets an id3v2.4 tag in front, opus gets its comment header replaced and aac gets ilst
// atoms in the moov of the init segment
use base64::{Engine, engine::general_purpose::STANDARD};

use crate::server::error::{AppResult, Error};
use crate::upstream::model::Track;

/// picture type "front cover", same number in id3 and flac
const FRONT_COVER: u8 = 3;

const ID3_UTF8: u8 = 3;

const OGG_CAPTURE: &[u8] = b"OggS";
const OGG_HEADER_LEN: usize = 27;
const OGG_CONTINUED: u8 = 0x01;
const OGG_SEQUENCE: std::ops::Range<usize> = 18..22;
const OGG_CHECKSUM: std::ops::Range<usize> = 22..26;
const OGG_SEGMENTS: usize = 26;
const OPUS_VENDOR: &str = env!("CARGO_PKG_NAME");

const MP4_UTF8: u32 = 1;
const MP4_JPEG: u32 = 13;
const MP4_PNG: u32 = 14;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artwork {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// what ends up in the tags of a download
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
    pub genre: String,
    pub artwork: Option<Artwork>,
}

impl TrackMetadata {
    pub fn for_track(track: &Track) -> Self {
        Self {
            title: track.title.clone(),
            artist: track.author.username.clone(),
            genre: track.genre.clone(),
            artwork: None,
        }
    }
}

fn broken(what: &str) -> Error {
    Error::InternalServerErrorWithContext(format!("can't tag this file: {}", what))
}

fn syncsafe(n: usize) -> [u8; 4] {
    let n = n as u32;
    [
        ((n >> 21) & 0x7f) as u8,
        ((n >> 14) & 0x7f) as u8,
        ((n >> 7) & 0x7f) as u8,
        (n & 0x7f) as u8,
    ]
}

fn id3_frame(out: &mut Vec<u8>, id: &[u8; 4], body: &[u8]) {
    out.extend_from_slice(id);
    out.extend_from_slice(&syncsafe(body.len()));
    out.extend_from_slice(&[0, 0]);
    out.extend_from_slice(body);
}

fn id3_text(out: &mut Vec<u8>, id: &[u8; 4], text: &str) {
    if text.is_empty() {
        return;
    }

    let mut body = Vec::with_capacity(text.len() + 1);
    body.push(ID3_UTF8);
    body.extend_from_slice(text.as_bytes());
    id3_frame(out, id, &body);
}

/// an id3v2.4 tag, goes right before the first mp3 frame
pub fn id3v2_tag(metadata: &TrackMetadata) -> Vec<u8> {
    let mut frames = Vec::new();
    id3_text(&mut frames, b"TIT2", &metadata.title);
    id3_text(&mut frames, b"TPE1", &metadata.artist);
    id3_text(&mut frames, b"TCON", &metadata.genre);

    if let Some(artwork) = &metadata.artwork {
        let mut body = Vec::with_capacity(artwork.mime_type.len() + artwork.data.len() + 4);
        body.push(ID3_UTF8);
        body.extend_from_slice(artwork.mime_type.as_bytes());
        body.push(0);
        body.push(FRONT_COVER);
        // empty description
        body.push(0);
        body.extend_from_slice(&artwork.data);
        id3_frame(&mut frames, b"APIC", &body);
    }

    let mut tag = Vec::with_capacity(10 + frames.len());
    tag.extend_from_slice(b"ID3");
    tag.extend_from_slice(&[4, 0, 0]);
    tag.extend_from_slice(&syncsafe(frames.len()));
    tag.extend_from_slice(&frames);
    tag
}

/// a flac picture block, the form vorbis comments carry pictures in
fn flac_picture(artwork: &Artwork) -> Vec<u8> {
    let mut block = Vec::with_capacity(32 + artwork.mime_type.len() + artwork.data.len());
    block.extend_from_slice(&u32::from(FRONT_COVER).to_be_bytes());
    block.extend_from_slice(&(artwork.mime_type.len() as u32).to_be_bytes());
    block.extend_from_slice(artwork.mime_type.as_bytes());
    // description length, width, height, color depth, indexed colors
    block.extend_from_slice(&[0u8; 20]);
    block.extend_from_slice(&(artwork.data.len() as u32).to_be_bytes());
    block.extend_from_slice(&artwork.data);
    block
}

/// the `OpusTags` packet
pub fn opus_comment_packet(metadata: &TrackMetadata) -> Vec<u8> {
    let mut fields = vec![
        format!("ARTIST={}", metadata.artist),
        format!("TITLE={}", metadata.title),
    ];

    if !metadata.genre.is_empty() {
        fields.push(format!("GENRE={}", metadata.genre));
    }

    if let Some(artwork) = &metadata.artwork {
        fields.push(format!(
            "METADATA_BLOCK_PICTURE={}",
            STANDARD.encode(flac_picture(artwork))
        ));
    }

    let mut packet = Vec::new();
    packet.extend_from_slice(b"OpusTags");
    packet.extend_from_slice(&(OPUS_VENDOR.len() as u32).to_le_bytes());
    packet.extend_from_slice(OPUS_VENDOR.as_bytes());
    packet.extend_from_slice(&(fields.len() as u32).to_le_bytes());

    for field in fields {
        packet.extend_from_slice(&(field.len() as u32).to_le_bytes());
        packet.extend_from_slice(field.as_bytes());
    }

    packet
}

const fn ogg_crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;

    while i < 256 {
        let mut r = (i as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            r = if r & 0x8000_0000 != 0 {
                (r << 1) ^ 0x04c1_1db7
            } else {
                r << 1
            };
            bit += 1;
        }

        table[i] = r;
        i += 1;
    }

    table
}

static OGG_CRC_TABLE: [u32; 256] = ogg_crc_table();

/// crc32 as ogg does it: not reflected, no final xor
pub fn ogg_crc(data: &[u8]) -> u32 {
    data.iter().fold(0u32, |crc, &b| {
        (crc << 8) ^ OGG_CRC_TABLE[((crc >> 24) as u8 ^ b) as usize]
    })
}

/// recomputes the checksum of a whole page
fn seal_page(page: &mut [u8]) {
    page[OGG_CHECKSUM].fill(0);
    let crc = ogg_crc(page);
    page[OGG_CHECKSUM].copy_from_slice(&crc.to_le_bytes());
}

/// length of the page at the start of `data`, `None` if there isn't a complete one
pub fn ogg_page_len(data: &[u8]) -> Option<usize> {
    if data.len() < OGG_HEADER_LEN || !data.starts_with(OGG_CAPTURE) {
        return None;
    }

    let segments = data[OGG_SEGMENTS] as usize;
    let lacing = data.get(OGG_HEADER_LEN..OGG_HEADER_LEN + segments)?;
    let len = OGG_HEADER_LEN + segments + lacing.iter().map(|&b| b as usize).sum::<usize>();

    (len <= data.len()).then_some(len)
}

/// lays `packet` out over as many pages as it needs, the first one takes the serial and
/// sequence number of `template`. Returns the pages and how many there are
fn packet_pages(template: &[u8], packet: &[u8]) -> (Vec<u8>, u32) {
    let serial = &template[14..18];
    let sequence = u32::from_le_bytes([template[18], template[19], template[20], template[21]]);

    let mut lacing = vec![255u8; packet.len() / 255];
    lacing.push((packet.len() % 255) as u8);

    let chunks: Vec<&[u8]> = lacing.chunks(255).collect();
    let mut pages = Vec::with_capacity(packet.len() + chunks.len() * (OGG_HEADER_LEN + 255));
    let mut offset = 0;

    for (index, chunk) in chunks.iter().enumerate() {
        let body = chunk.iter().map(|&b| b as usize).sum::<usize>();
        let last = index + 1 == chunks.len();
        let start = pages.len();

        pages.extend_from_slice(OGG_CAPTURE);
        pages.push(0);
        pages.push(if index == 0 { 0 } else { OGG_CONTINUED });
        // no packet ends on a page that is full, those get -1
        let granule: u64 = if last { 0 } else { u64::MAX };
        pages.extend_from_slice(&granule.to_le_bytes());
        pages.extend_from_slice(serial);
        pages.extend_from_slice(&sequence.wrapping_add(index as u32).to_le_bytes());
        pages.extend_from_slice(&[0; 4]);
        pages.push(chunk.len() as u8);
        pages.extend_from_slice(chunk);
        pages.extend_from_slice(&packet[offset..offset + body]);
        offset += body;

        seal_page(&mut pages[start..]);
    }

    (pages, chunks.len() as u32)
}

/// moves every page sequence number in `data` by `shift`
///
/// whatever doesn't parse as a page is copied as is
pub fn shift_ogg_sequence(data: &[u8], shift: i32) -> Vec<u8> {
    let mut out = data.to_vec();
    if shift == 0 {
        return out;
    }

    let mut at = 0;
    while let Some(len) = ogg_page_len(&out[at..]) {
        let page = &mut out[at..at + len];

        let sequence = u32::from_le_bytes([page[18], page[19], page[20], page[21]]);
        page[OGG_SEQUENCE].copy_from_slice(&sequence.wrapping_add_signed(shift).to_le_bytes());
        seal_page(page);

        at += len;
    }

    out
}

/// swaps the comment header of an ogg opus stream (everything after the first page up to the
/// first audio page) for one with `metadata`
///
/// returns the new data and how many pages the header grew by, every later page of the stream
/// has to move its sequence number by that much
pub fn inject_opus_tags(segment: &[u8], metadata: &TrackMetadata) -> AppResult<(Vec<u8>, i32)> {
    let head = ogg_page_len(segment).ok_or_else(|| broken("no opus head page"))?;
    let first_comment = ogg_page_len(&segment[head..]).ok_or_else(|| broken("no comment page"))?;

    let mut end = head + first_comment;
    let mut old_pages = 1;
    while let Some(len) = ogg_page_len(&segment[end..]) {
        if segment[end + 5] & OGG_CONTINUED == 0 {
            break;
        }

        end += len;
        old_pages += 1;
    }

    let (pages, new_pages) = packet_pages(&segment[head..], &opus_comment_packet(metadata));
    let shift = new_pages as i32 - old_pages;

    let mut out = Vec::with_capacity(segment.len() + pages.len());
    out.extend_from_slice(&segment[..head]);
    out.extend_from_slice(&pages);
    out.extend_from_slice(&shift_ogg_sequence(&segment[end..], shift));

    Ok((out, shift))
}

/// (header length, box length, box type) of the box starting at `at`
fn mp4_box_at(data: &[u8], at: usize) -> Option<(usize, usize, [u8; 4])> {
    let size = u32::from_be_bytes(data.get(at..at + 4)?.try_into().ok()?) as usize;
    let kind: [u8; 4] = data.get(at + 4..at + 8)?.try_into().ok()?;

    let (header, size) = match size {
        0 => (8, data.len() - at),
        1 => (
            16,
            u64::from_be_bytes(data.get(at + 8..at + 16)?.try_into().ok()?) as usize,
        ),
        size => (8, size),
    };

    (size >= header && at + size <= data.len()).then_some((header, size, kind))
}

fn mp4_box(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + body.len());
    out.extend_from_slice(&((8 + body.len()) as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(body);
    out
}

fn ilst_item(kind: &[u8; 4], data_type: u32, value: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(8 + value.len());
    data.extend_from_slice(&data_type.to_be_bytes());
    // locale
    data.extend_from_slice(&[0; 4]);
    data.extend_from_slice(value);

    mp4_box(kind, &mp4_box(b"data", &data))
}

/// `udta` > `meta` > `ilst`, the way itunes style tags are laid out
pub fn mp4_metadata(metadata: &TrackMetadata) -> Vec<u8> {
    let mut ilst = Vec::new();
    ilst.extend(ilst_item(b"\xa9nam", MP4_UTF8, metadata.title.as_bytes()));
    ilst.extend(ilst_item(b"\xa9ART", MP4_UTF8, metadata.artist.as_bytes()));

    if !metadata.genre.is_empty() {
        ilst.extend(ilst_item(b"\xa9gen", MP4_UTF8, metadata.genre.as_bytes()));
    }

    if let Some(artwork) = &metadata.artwork {
        let data_type = match artwork.mime_type.as_str() {
            "image/jpeg" => Some(MP4_JPEG),
            "image/png" => Some(MP4_PNG),
            _ => None,
        };

        if let Some(data_type) = data_type {
            ilst.extend(ilst_item(b"covr", data_type, &artwork.data));
        }
    }

    // version/flags, pre_defined, handler type, reserved, empty name
    let mut hdlr = vec![0u8; 8];
    hdlr.extend_from_slice(b"mdir");
    hdlr.extend_from_slice(b"appl");
    hdlr.extend_from_slice(&[0u8; 9]);

    // meta is a full box
    let mut meta = vec![0u8; 4];
    meta.extend(mp4_box(b"hdlr", &hdlr));
    meta.extend(mp4_box(b"ilst", &ilst));

    mp4_box(b"udta", &mp4_box(b"meta", &meta))
}

/// puts `metadata` into the `moov` of an init segment, replacing any `udta` it had
///
/// fragments address their samples relative to their own `moof`, so growing the `moov` is fine
pub fn inject_mp4_tags(segment: &[u8], metadata: &TrackMetadata) -> AppResult<Vec<u8>> {
    let mut at = 0;

    while at < segment.len() {
        let (header, size, kind) = mp4_box_at(segment, at).ok_or_else(|| broken("bad mp4 box"))?;

        if &kind == b"moov" {
            let moov = &segment[..at + size];
            let mut children = Vec::with_capacity(size);
            let mut child = at + header;

            while child < at + size {
                let (_, child_size, child_kind) =
                    mp4_box_at(moov, child).ok_or_else(|| broken("bad moov child"))?;

                if &child_kind != b"udta" {
                    children.extend_from_slice(&segment[child..child + child_size]);
                }

                child += child_size;
            }

            children.extend(mp4_metadata(metadata));

            let mut out = Vec::with_capacity(segment.len() + children.len());
            out.extend_from_slice(&segment[..at]);
            out.extend(mp4_box(b"moov", &children));
            out.extend_from_slice(&segment[at + size..]);

            return Ok(out);
        }

        at += size;
    }

    Err(broken("no moov"))
}
