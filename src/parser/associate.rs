use std::collections::{BTreeMap, HashMap};

use crate::model::{ImageRegion, Page, Question};

/// Index into the image list -> question number.
pub type Association = BTreeMap<usize, u32>;

/// Decides which question an image illustrates.
pub trait AssociationStrategy {
    fn associate(&self, images: &[ImageRegion], questions: &[Question], pages: &[Page]) -> Association;
}

/// Page-level label co-occurrence. Every question whose `Q.<n>` or `Q<n>`
/// label appears anywhere in the image's page text is a match; the last such
/// question in document order wins. No vertical position is consulted.
pub struct LastLabelOnPage;

impl AssociationStrategy for LastLabelOnPage {
    fn associate(&self, images: &[ImageRegion], questions: &[Question], pages: &[Page]) -> Association {
        let mut mapping = Association::new();
        if questions.is_empty() {
            return mapping;
        }

        let page_text: HashMap<u32, &str> =
            pages.iter().map(|p| (p.page_number, p.text.as_str())).collect();

        for (idx, image) in images.iter().enumerate() {
            let Some(text) = page_text.get(&image.page_number) else {
                continue;
            };
            let winner = questions
                .iter()
                .filter(|q| label_on_page(q.number, text))
                .last();
            if let Some(q) = winner {
                mapping.insert(idx, q.number);
            }
        }

        mapping
    }
}

fn label_on_page(number: u32, text: &str) -> bool {
    text.contains(&format!("Q.{}", number)) || text.contains(&format!("Q{}", number))
}

/// Attach asset paths to their questions in image order. Returns how many
/// images found a home.
pub fn apply(association: &Association, images: &[ImageRegion], questions: &mut [Question]) -> usize {
    let mut attached = 0;
    for (&idx, &number) in association {
        let Some(image) = images.get(idx) else {
            continue;
        };
        if let Some(q) = questions.iter_mut().find(|q| q.number == number) {
            q.attach_diagram(image.asset_path.to_string_lossy());
            attached += 1;
        }
    }
    attached
}

// ── Tests ──
