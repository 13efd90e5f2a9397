use crate::content::{Document, Lines, SectionBody};
use crate::nav::NavItem;

pub const ANCHOR_PREFIX: &str = "daily-";

/// One renderable unit of the daily prayer page, in reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Byline { source: String, url: String },
    Heading { anchor: String, title: String },
    Subheading { anchor: String, title: String },
    Intro(String),
    Paragraph(String),
    Deity(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailyPage {
    pub blocks: Vec<Block>,
}

#[cfg(test)]
impl DailyPage {
    pub fn anchors(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Heading { anchor, .. } | Block::Subheading { anchor, .. } => {
                Some(anchor.as_str())
            }
            _ => None,
        })
    }
}

pub fn section_anchor(id: &str) -> String {
    format!("{ANCHOR_PREFIX}{id}")
}

pub fn render_daily(document: &Document) -> DailyPage {
    let mut blocks = vec![Block::Byline {
        source: document.source.clone(),
        url: document.source_url.clone(),
    }];

    for section in &document.sections {
        let anchor = section_anchor(&section.id);
        blocks.push(Block::Heading {
            anchor: anchor.clone(),
            title: section.title.clone(),
        });
        match &section.body {
            SectionBody::Content(content) => {
                if let Some(intro) = &section.intro {
                    blocks.push(Block::Intro(intro.clone()));
                }
                push_paragraphs(&mut blocks, content);
            }
            SectionBody::Subsections(subsections) => {
                for (idx, sub) in subsections.iter().enumerate() {
                    blocks.push(Block::Subheading {
                        anchor: format!("{anchor}-{}", idx + 1),
                        title: sub.title.clone(),
                    });
                    if let Some(intro) = &sub.intro {
                        blocks.push(Block::Intro(intro.clone()));
                    }
                    push_paragraphs(&mut blocks, &sub.content);
                    if let Some(deity) = &sub.deity {
                        blocks.push(Block::Deity(deity.clone()));
                    }
                }
            }
        }
    }

    DailyPage { blocks }
}

fn push_paragraphs(blocks: &mut Vec<Block>, content: &Lines) {
    blocks.extend(
        content
            .lines()
            .into_iter()
            .map(|line| Block::Paragraph(line.to_string())),
    );
}

pub fn daily_nav(document: &Document) -> Vec<NavItem> {
    document
        .sections
        .iter()
        .map(|section| NavItem::link(&section.title, section_anchor(&section.id)))
        .collect()
}
