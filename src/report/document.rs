//! PDF rendering of shopping lists.
//!
//! Text is set in the standard Times-Roman font, which every reader ships,
//! so rendering never depends on a font file being present.

use std::{
    io::Write,
    path::{Component, Path, PathBuf},
};

use flate2::{write::ZlibEncoder, Compression};
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref, Str};

use crate::{
    constants::{
        FONT_SIZE, IMAGE_RECT, LINE_HEIGHT, PAGE_HEIGHT, PAGE_WIDTH, TEXT_BOTTOM, TEXT_LEFT,
        TEXT_TOP,
    },
    error::Error,
};

const FONT_NAME: Name<'static> = Name(b"F1");
const IMAGE_NAME: Name<'static> = Name(b"Im1");

/// A decoded RGB picture, zlib compressed.
#[derive(Debug, Clone)]
pub struct Picture {
    pub width: u32,
    pub height: u32,
    data: Vec<u8>,
}

/// A rendered file ready to be sent as an attachment.
#[derive(Debug, Clone)]
pub struct Document {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Resolves a stored image path below the media root.
pub fn media_path(media_root: &Path, image: &str) -> Option<PathBuf> {
    let relative = Path::new(image);
    if relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
    {
        Some(media_root.join(relative))
    } else {
        None
    }
}

pub fn load_picture(path: &Path) -> Result<Picture, Error> {
    let decoded = image::open(path)
        .map_err(|e| Error::Internal(format!("Cannot decode {}: {e}", path.display())))?
        .to_rgb8();

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(decoded.as_raw())
        .and_then(|_| encoder.flush())
        .map_err(|e| Error::Internal(format!("Cannot compress {}: {e}", path.display())))?;
    let data = encoder
        .finish()
        .map_err(|e| Error::Internal(format!("Cannot compress {}: {e}", path.display())))?;

    Ok(Picture {
        width: decoded.width(),
        height: decoded.height(),
        data,
    })
}

/// WinAnsi bytes for a line; characters outside Latin-1 become '?'.
fn encode_line(line: &str) -> Vec<u8> {
    line.chars()
        .map(|c| match c as u32 {
            code @ (0x20..=0x7E | 0xA0..=0xFF) => code as u8,
            _ => b'?',
        })
        .collect()
}

fn lines_per_page() -> usize {
    ((TEXT_TOP - TEXT_BOTTOM) / LINE_HEIGHT) as usize + 1
}

/// Lays the lines out top to bottom, continuing on new pages as needed.
/// The picture goes to the lower right corner of the first page.
pub fn render(lines: &[String], picture: Option<&Picture>) -> Vec<u8> {
    let mut pdf = Pdf::new();
    let mut next = 1;
    let mut alloc = || {
        let id = Ref::new(next);
        next += 1;
        id
    };

    let catalog_id = alloc();
    let page_tree_id = alloc();
    let font_id = alloc();
    let image_id = picture.map(|_| alloc());

    let chunks: Vec<&[String]> = if lines.is_empty() {
        vec![&[]]
    } else {
        lines.chunks(lines_per_page()).collect()
    };
    let pages: Vec<(Ref, Ref)> = chunks.iter().map(|_| (alloc(), alloc())).collect();

    pdf.catalog(catalog_id).pages(page_tree_id);
    pdf.pages(page_tree_id)
        .kids(pages.iter().map(|(page_id, _)| *page_id))
        .count(pages.len() as i32);
    pdf.type1_font(font_id)
        .base_font(Name(b"Times-Roman"))
        .encoding_predefined(Name(b"WinAnsiEncoding"));

    for (index, (chunk, (page_id, content_id))) in chunks.iter().zip(&pages).enumerate() {
        let image_id = image_id.filter(|_| index == 0);

        let mut page = pdf.page(*page_id);
        page.media_box(Rect::new(0.0, 0.0, PAGE_WIDTH, PAGE_HEIGHT));
        page.parent(page_tree_id);
        page.contents(*content_id);
        let mut resources = page.resources();
        resources.fonts().pair(FONT_NAME, font_id);
        if let Some(image_id) = image_id {
            resources.x_objects().pair(IMAGE_NAME, image_id);
        }
        resources.finish();
        page.finish();

        let mut content = Content::new();
        for (row, line) in chunk.iter().enumerate() {
            let y = TEXT_TOP - row as f32 * LINE_HEIGHT;
            content.begin_text();
            content.set_font(FONT_NAME, FONT_SIZE);
            content.next_line(TEXT_LEFT, y);
            content.show(Str(&encode_line(line)));
            content.end_text();
        }
        if image_id.is_some() {
            let (x, y, width, height) = IMAGE_RECT;
            content.save_state();
            content.transform([width, 0.0, 0.0, height, x, y]);
            content.x_object(IMAGE_NAME);
            content.restore_state();
        }
        pdf.stream(*content_id, &content.finish());
    }

    if let (Some(picture), Some(image_id)) = (picture, image_id) {
        let mut image = pdf.image_xobject(image_id, &picture.data);
        image.filter(Filter::FlateDecode);
        image.width(picture.width as i32);
        image.height(picture.height as i32);
        image.color_space().device_rgb();
        image.bits_per_component(8);
        image.finish();
    }

    pdf.finish()
}
