use crate::config::Config;
use crate::models::*;
use anyhow::{Context, Result};
use rayon::prelude::*;
use regex::Regex;
use std::collections::VecDeque;
use std::path::Path;
use uuid::Uuid;

/// Splits text on a separator and merges the pieces back into
/// overlapping windows of bounded length (measured in chars).
#[derive(Debug, Clone)]
pub struct TextSplitter {
    separator: String,
    pattern: Regex,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    pub fn new(
        separator: &str,
        separator_is_regex: bool,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<Self> {
        if chunk_overlap > chunk_size {
            return Err(anyhow::anyhow!(
                "chunk overlap ({}) is larger than chunk size ({})",
                chunk_overlap,
                chunk_size
            ));
        }

        let pattern = if separator_is_regex {
            Regex::new(separator)?
        } else {
            Regex::new(&regex::escape(separator))?
        };

        Ok(Self {
            separator: separator.to_string(),
            pattern,
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.separator, false, config.chunk_size, config.chunk_overlap)
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_with_offsets(text)
            .into_iter()
            .map(|(window, _)| window)
            .collect()
    }

    /// Windows paired with the char position where each starts in `text`.
    pub fn split_with_offsets(&self, text: &str) -> Vec<(String, usize)> {
        let pieces = self.pieces(text);
        self.merge_pieces(&pieces)
    }

    /// Non-empty pieces between separator matches, with their char starts.
    fn pieces<'a>(&self, text: &'a str) -> Vec<Piece<'a>> {
        let mut pieces = Vec::new();
        let mut byte_cursor = 0;
        let mut char_cursor = 0;
        let mut last = 0;

        let mut push = |from: usize, to: usize, pieces: &mut Vec<Piece<'a>>| {
            if from < to {
                char_cursor += text[byte_cursor..from].chars().count();
                byte_cursor = from;
                let piece = &text[from..to];
                pieces.push(Piece {
                    text: piece,
                    len: piece.chars().count(),
                    start: char_cursor,
                });
            }
        };

        for found in self.pattern.find_iter(text) {
            push(last, found.start(), &mut pieces);
            last = found.end();
        }
        push(last, text.len(), &mut pieces);

        pieces
    }

    fn merge_pieces(&self, pieces: &[Piece<'_>]) -> Vec<(String, usize)> {
        let separator_len = self.separator.chars().count();
        let mut windows = Vec::new();
        let mut current: VecDeque<Piece<'_>> = VecDeque::new();
        let mut total = 0;

        for &piece in pieces {
            let joiner = if current.is_empty() { 0 } else { separator_len };

            if total + piece.len + joiner > self.chunk_size {
                if total > self.chunk_size {
                    log::warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total,
                        self.chunk_size
                    );
                }

                if !current.is_empty() {
                    if let Some(window) = self.join(&current) {
                        windows.push(window);
                    }

                    // Drop from the front until what is left fits as overlap.
                    loop {
                        let joiner = if current.is_empty() { 0 } else { separator_len };
                        let must_shrink = total > self.chunk_overlap
                            || (total + piece.len + joiner > self.chunk_size && total > 0);
                        if !must_shrink {
                            break;
                        }
                        match current.pop_front() {
                            Some(first) => {
                                let joiner = if current.is_empty() { 0 } else { separator_len };
                                total -= first.len + joiner;
                            }
                            None => break,
                        }
                    }
                }
            }

            current.push_back(piece);
            total += piece.len + if current.len() > 1 { separator_len } else { 0 };
        }

        if let Some(window) = self.join(&current) {
            windows.push(window);
        }

        windows
    }

    fn join(&self, pieces: &VecDeque<Piece<'_>>) -> Option<(String, usize)> {
        let first = pieces.front()?;
        let joined = pieces
            .iter()
            .map(|piece| piece.text)
            .collect::<Vec<_>>()
            .join(&self.separator);
        let trimmed_start = joined.trim_start();
        let skipped = joined.chars().count() - trimmed_start.chars().count();
        let trimmed = trimmed_start.trim_end();

        if trimmed.is_empty() {
            None
        } else {
            Some((trimmed.to_string(), first.start + skipped))
        }
    }

    /// Splits one page, recording where each window starts inside it.
    pub fn split_document(&self, document: &Document) -> Vec<DocumentChunk> {
        self.split_with_offsets(&document.content)
            .into_iter()
            .map(|(window, start_index)| DocumentChunk {
                id: Uuid::new_v4().to_string(),
                content: window,
                source: document.source.clone(),
                page: document.page,
                start_index,
            })
            .collect()
    }

    pub fn split_documents(&self, documents: &[Document]) -> Vec<DocumentChunk> {
        let per_page: Vec<Vec<DocumentChunk>> = documents
            .par_iter()
            .map(|document| self.split_document(document))
            .collect();

        per_page.into_iter().flatten().collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct Piece<'a> {
    text: &'a str,
    len: usize,
    start: usize,
}

pub struct DocumentProcessor {
    splitter: TextSplitter,
}

impl DocumentProcessor {
    pub fn new(splitter: TextSplitter) -> Self {
        Self { splitter }
    }

    /// Loads and splits a PDF into chunks ready for embedding.
    pub fn process_pdf(&self, file_path: &Path) -> Result<Vec<DocumentChunk>> {
        let pages = self.load_pdf(file_path)?;
        let chunks = self.splitter.split_documents(&pages);

        log::info!("Created {} chunks", chunks.len());
        Ok(chunks)
    }

    pub fn load_pdf(&self, file_path: &Path) -> Result<Vec<Document>> {
        log::info!("Processing PDF: {}", file_path.display());

        let pages = pdf_extract::extract_text_by_pages(file_path)
            .with_context(|| format!("failed to read PDF {}", file_path.display()))?;
        let total_pages = pages.len();
        let source = file_path.to_string_lossy().to_string();

        let documents: Vec<Document> = pages
            .into_iter()
            .enumerate()
            .map(|(page, content)| Document {
                id: Uuid::new_v4().to_string(),
                source: source.clone(),
                page,
                total_pages,
                content,
            })
            .collect();

        log::info!("Loaded {} pages from {}", documents.len(), source);
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn page(content: &str, page: usize) -> Document {
        Document {
            id: format!("doc-{page}"),
            source: "pdf/knowledgebase.pdf".to_string(),
            page,
            total_pages: 2,
            content: content.to_string(),
        }
    }

    #[test]
    fn windows_overlap_by_trailing_lines() {
        let splitter = TextSplitter::new("\n", false, 9, 4).unwrap();
        let windows = splitter.split_text("aaaa\nbbbb\ncccc\ndddd");

        assert_eq!(windows, vec!["aaaa\nbbbb", "bbbb\ncccc", "cccc\ndddd"]);
        for window in &windows {
            assert!(window.chars().count() <= 9);
        }
    }

    #[test]
    fn short_text_stays_in_one_window() {
        let splitter = TextSplitter::new("\n", false, 1000, 200).unwrap();
        let windows = splitter.split_text("How to reset a password\nOpen settings");

        assert_eq!(windows, vec!["How to reset a password\nOpen settings"]);
    }

    #[test]
    fn empty_lines_are_dropped() {
        let splitter = TextSplitter::new("\n", false, 1000, 200).unwrap();

        assert_eq!(splitter.split_text("first\n\n\nsecond"), vec!["first\nsecond"]);
        assert!(splitter.split_text("\n\n").is_empty());
    }

    #[test]
    fn oversized_piece_becomes_its_own_window() {
        let splitter = TextSplitter::new("\n", false, 5, 0).unwrap();
        let windows = splitter.split_text("abcdefgh\nxy");

        assert_eq!(windows, vec!["abcdefgh", "xy"]);
    }

    #[test]
    fn lengths_are_counted_in_chars() {
        let splitter = TextSplitter::new("\n", false, 9, 0).unwrap();
        let windows = splitter.split_text("éééé\nüüüü\nöö");

        assert_eq!(windows, vec!["éééé\nüüüü", "öö"]);
    }

    #[test]
    fn regex_separator_splits_on_pattern() {
        let splitter = TextSplitter::new(r"\s*;\s*", true, 3, 0).unwrap();
        let windows = splitter.split_text("ab ; cd;ef");

        assert_eq!(windows, vec!["ab", "cd", "ef"]);
    }

    #[test]
    fn overlap_larger_than_size_is_rejected() {
        assert!(TextSplitter::new("\n", false, 100, 200).is_err());
    }

    #[test]
    fn split_documents_keeps_page_order_and_offsets() {
        let splitter = TextSplitter::new("\n", false, 9, 4).unwrap();
        let pages = vec![page("aaaa\nbbbb\ncccc\ndddd", 0), page("zz", 1)];

        let chunks = splitter.split_documents(&pages);

        let summary: Vec<(usize, usize, &str)> = chunks
            .iter()
            .map(|c| (c.page, c.start_index, c.content.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (0, 0, "aaaa\nbbbb"),
                (0, 5, "bbbb\ncccc"),
                (0, 10, "cccc\ndddd"),
                (1, 0, "zz"),
            ]
        );
        assert!(chunks.iter().all(|c| c.source == "pdf/knowledgebase.pdf"));
    }

    #[test]
    fn offsets_skip_dropped_blank_lines() {
        let splitter = TextSplitter::new("\n", false, 9, 4).unwrap();
        let text = "aaaa\n\n\nbbbb\n\n\ncccc";

        let windows = splitter.split_with_offsets(text);

        assert_eq!(
            windows,
            vec![("aaaa\nbbbb".to_string(), 0), ("bbbb\ncccc".to_string(), 7)]
        );
    }

    #[test]
    fn offsets_point_at_window_start_in_page() {
        let splitter = TextSplitter::new("\n", false, 9, 4).unwrap();
        let text = "aaaa\n\n\nbbbb\n\n\ncccc\n\n\ndddd";

        let windows = splitter.split_with_offsets(text);

        assert_eq!(
            windows.iter().map(|(_, start)| *start).collect::<Vec<_>>(),
            vec![0, 7, 14]
        );
        let chars: Vec<char> = text.chars().collect();
        for (window, start) in &windows {
            let first_piece = window.split('\n').next().unwrap();
            let at: String = chars[*start..*start + first_piece.chars().count()].iter().collect();
            assert_eq!(at, first_piece);
        }
    }

    #[test]
    fn offsets_account_for_trimmed_whitespace_and_multibyte_chars() {
        let splitter = TextSplitter::new("\n", false, 1000, 200).unwrap();

        let windows = splitter.split_with_offsets("éé\n\n   hello\nworld");

        assert_eq!(windows, vec![("éé\n   hello\nworld".to_string(), 0)]);

        let windows = splitter.split_with_offsets("\n\n   hello");
        assert_eq!(windows, vec![("hello".to_string(), 5)]);
    }

    #[test]
    fn missing_pdf_is_an_error() {
        let processor = DocumentProcessor::new(TextSplitter::new("\n", false, 1000, 200).unwrap());

        assert!(processor.process_pdf(Path::new("does/not/exist.pdf")).is_err());
    }

    #[test]
    fn malformed_pdf_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"this is not a pdf").unwrap();
        let processor = DocumentProcessor::new(TextSplitter::new("\n", false, 1000, 200).unwrap());

        assert!(processor.load_pdf(file.path()).is_err());
    }
}
