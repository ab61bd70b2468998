//! Artifact rendering and writing.
//!
//! Each invocation gets its own directory `<output_dir>/<invocation_id>/`
//! holding the primary artifact (`journal_article.docx` or `.md`),
//! `manuscript.json` and a `manifest.json` with checksums. Every file is
//! written to a temp name first and renamed into place, inside a staging
//! directory that only becomes visible once complete.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use quick_xml::escape::escape;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};
use zip::write::SimpleFileOptions;

use thesisforge_references::format_apa;
use thesisforge_shared::{ChapterType, InvocationId, Language, OutputFormat, Result, ThesisForgeError};

use crate::assembler::Manuscript;

const ARTICLE_STEM: &str = "journal_article";
const ACKNOWLEDGMENTS_HEADING: &str = "UCAPAN TERIMA KASIH";

/// Metadata for a single written file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactMeta {
    pub filename: String,
    pub sha256: String,
    pub size_bytes: usize,
}

/// Where an invocation's output landed.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactReference {
    pub directory: PathBuf,
    pub format: OutputFormat,
    pub primary: ArtifactMeta,
    pub artifacts: Vec<ArtifactMeta>,
}

impl ArtifactReference {
    pub fn primary_path(&self) -> PathBuf {
        self.directory.join(&self.primary.filename)
    }
}

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    invocation_id: String,
    created_at: String,
    requested_format: OutputFormat,
    rendered_format: OutputFormat,
    title: &'a str,
    word_count: usize,
    reference_count: usize,
    artifacts: &'a [ArtifactMeta],
}

/// The format actually rendered for a request. PDF has no renderer and
/// falls back to DOCX.
pub fn effective_format(requested: OutputFormat) -> OutputFormat {
    match requested {
        OutputFormat::Pdf => OutputFormat::Docx,
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Section layout
// ---------------------------------------------------------------------------

enum Block<'a> {
    Title(&'a str),
    Centered(String),
    Heading(&'a str),
    Paragraph { text: String, italic: bool },
    Keywords { label: &'static str, keywords: String, italic: bool },
}

fn abstract_heading(language: Language) -> &'static str {
    match language {
        Language::English => "ABSTRACT",
        Language::Indonesian => "ABSTRAK",
    }
}

fn keywords_label(language: Language) -> &'static str {
    match language {
        Language::English => "Keywords: ",
        Language::Indonesian => "Kata Kunci: ",
    }
}

fn paragraphs(body: &str) -> impl Iterator<Item = String> + '_ {
    body.split("\n\n")
        .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|p| !p.is_empty())
}

/// Flatten the manuscript into the journal article layout.
fn layout(manuscript: &Manuscript) -> Vec<Block<'_>> {
    let mut blocks = vec![Block::Title(manuscript.title())];

    if let Some((first, rest)) = manuscript.authors().split_first() {
        let mut line = format!("{first}¹*");
        for name in rest {
            line.push_str(", ");
            line.push_str(name);
        }
        blocks.push(Block::Centered(line));
    }
    if !manuscript.affiliation().is_empty() {
        blocks.push(Block::Centered(format!("¹{}", manuscript.affiliation())));
    }
    if !manuscript.email().is_empty() {
        blocks.push(Block::Centered(format!("*Email: {}", manuscript.email())));
    }

    for language in Language::ALL {
        let Some(text) = manuscript.abstract_text(language) else {
            continue;
        };
        let italic = language == Language::English;
        blocks.push(Block::Heading(abstract_heading(language)));
        blocks.push(Block::Paragraph {
            text: text.to_string(),
            italic,
        });
        let keywords = manuscript.keywords(language);
        if !keywords.is_empty() {
            blocks.push(Block::Keywords {
                label: keywords_label(language),
                keywords: keywords.join(", "),
                italic,
            });
        }
    }

    for chapter in manuscript
        .chapters()
        .filter(|c| !matches!(c.chapter_type, ChapterType::Cover | ChapterType::References))
    {
        blocks.push(Block::Heading(chapter.chapter_type.heading()));
        blocks.extend(paragraphs(&chapter.body).map(|text| Block::Paragraph { text, italic: false }));
    }

    blocks.push(Block::Heading(ACKNOWLEDGMENTS_HEADING));
    blocks.push(Block::Paragraph {
        text: manuscript.acknowledgments().to_string(),
        italic: false,
    });

    blocks.push(Block::Heading(ChapterType::References.heading()));
    blocks.extend(manuscript.references().iter().map(|r| Block::Paragraph {
        text: format_apa(r),
        italic: false,
    }));

    blocks
}

// ---------------------------------------------------------------------------
// Markdown
// ---------------------------------------------------------------------------

pub fn render_markdown(manuscript: &Manuscript) -> String {
    let mut out = String::new();
    for block in layout(manuscript) {
        match block {
            Block::Title(title) => out.push_str(&format!("# {title}\n\n")),
            Block::Centered(line) => out.push_str(&format!("{line}  \n")),
            Block::Heading(heading) => out.push_str(&format!("\n## {heading}\n\n")),
            Block::Paragraph { text, italic: true } => out.push_str(&format!("*{text}*\n\n")),
            Block::Paragraph { text, italic: false } => out.push_str(&format!("{text}\n\n")),
            Block::Keywords { label, keywords, .. } => {
                out.push_str(&format!("**{}** {keywords}\n\n", label.trim_end()));
            }
        }
    }
    out.truncate(out.trim_end().len());
    out.push('\n');
    out
}

// ---------------------------------------------------------------------------
// DOCX
// ---------------------------------------------------------------------------

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

fn run(text: &str, bold: bool, italic: bool) -> String {
    let mut props = String::new();
    if bold {
        props.push_str("<w:b/>");
    }
    if italic {
        props.push_str("<w:i/>");
    }
    let props = if props.is_empty() {
        String::new()
    } else {
        format!("<w:rPr>{props}</w:rPr>")
    };
    format!(r#"<w:r>{props}<w:t xml:space="preserve">{}</w:t></w:r>"#, escape(text))
}

fn paragraph(style: Option<&str>, justify: &str, runs: &[String]) -> String {
    let style = style
        .map(|s| format!(r#"<w:pStyle w:val="{s}"/>"#))
        .unwrap_or_default();
    format!(
        r#"<w:p><w:pPr>{style}<w:jc w:val="{justify}"/></w:pPr>{}</w:p>"#,
        runs.concat()
    )
}

fn document_xml(manuscript: &Manuscript) -> String {
    let mut body = String::new();
    for block in layout(manuscript) {
        let p = match block {
            Block::Title(title) => paragraph(Some("Title"), "center", &[run(title, true, false)]),
            Block::Centered(line) => paragraph(None, "center", &[run(&line, false, false)]),
            Block::Heading(heading) => paragraph(Some("Heading1"), "left", &[run(heading, true, false)]),
            Block::Paragraph { text, italic } => paragraph(None, "both", &[run(&text, false, italic)]),
            Block::Keywords { label, keywords, italic } => paragraph(
                None,
                "both",
                &[run(label, true, italic), run(&keywords, false, italic)],
            ),
        };
        body.push_str(&p);
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440"/></w:sectPr></w:body></w:document>"#
    )
}

/// Render a minimal WordprocessingML package.
pub fn render_docx(manuscript: &Manuscript) -> Result<Vec<u8>> {
    let zip_err = |e: zip::result::ZipError| ThesisForgeError::Render(format!("DOCX packaging failed: {e}"));
    let io_err = |e: std::io::Error| ThesisForgeError::Render(format!("DOCX packaging failed: {e}"));

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let parts = [
        ("[Content_Types].xml", CONTENT_TYPES_XML.to_string()),
        ("_rels/.rels", RELS_XML.to_string()),
        ("word/document.xml", document_xml(manuscript)),
    ];
    for (name, content) in parts {
        writer.start_file(name, options).map_err(zip_err)?;
        writer.write_all(content.as_bytes()).map_err(io_err)?;
    }

    Ok(writer.finish().map_err(zip_err)?.into_inner())
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Write `content` to `dir/filename` via a temp file and rename.
fn write_atomic(dir: &Path, filename: &str, content: &[u8]) -> Result<ArtifactMeta> {
    let target = dir.join(filename);
    let temp = dir.join(format!(".{filename}.tmp"));

    std::fs::write(&temp, content).map_err(|e| ThesisForgeError::io(&temp, e))?;
    std::fs::rename(&temp, &target).map_err(|e| ThesisForgeError::io(&target, e))?;

    let mut hasher = Sha256::new();
    hasher.update(content);
    let hash = format!("{:x}", hasher.finalize());

    debug!(file = %filename, size = content.len(), "wrote artifact");

    Ok(ArtifactMeta {
        filename: filename.to_string(),
        sha256: hash,
        size_bytes: content.len(),
    })
}

fn write_json<T: Serialize>(dir: &Path, filename: &str, data: &T) -> Result<ArtifactMeta> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| ThesisForgeError::Render(format!("JSON serialization failed: {e}")))?;
    write_atomic(dir, filename, json.as_bytes())
}

fn staging_dir(output_dir: &Path, invocation_id: &InvocationId) -> PathBuf {
    output_dir.join(format!(".{invocation_id}.partial"))
}

/// Render the manuscript and write every artifact for one invocation.
///
/// Files are written into a staging directory that is renamed to
/// `<output_dir>/<invocation_id>/` once all of them exist; on any failure the
/// staging directory is removed and nothing is left behind.
#[instrument(skip_all, fields(%invocation_id, format = requested.as_str()))]
pub fn write_artifacts(
    manuscript: &Manuscript,
    output_dir: &Path,
    invocation_id: &InvocationId,
    requested: OutputFormat,
) -> Result<ArtifactReference> {
    let format = effective_format(requested);
    if format != requested {
        warn!(
            requested = requested.as_str(),
            rendered = format.as_str(),
            "no renderer for requested format, falling back"
        );
    }

    let dir = output_dir.join(invocation_id.to_string());
    let staging = staging_dir(output_dir, invocation_id);
    std::fs::create_dir_all(&staging).map_err(|e| ThesisForgeError::io(&staging, e))?;

    let written = write_staged(manuscript, &staging, invocation_id, requested, format).and_then(|written| {
        std::fs::rename(&staging, &dir).map_err(|e| ThesisForgeError::io(&dir, e))?;
        Ok(written)
    });
    let (primary, artifacts) = match written {
        Ok(written) => written,
        Err(e) => {
            if let Err(cleanup) = std::fs::remove_dir_all(&staging) {
                debug!(dir = %staging.display(), error = %cleanup, "could not remove staging directory");
            }
            return Err(e);
        }
    };

    info!(dir = %dir.display(), primary = %primary.filename, "artifacts written");

    Ok(ArtifactReference {
        directory: dir,
        format,
        primary,
        artifacts,
    })
}

fn write_staged(
    manuscript: &Manuscript,
    dir: &Path,
    invocation_id: &InvocationId,
    requested: OutputFormat,
    format: OutputFormat,
) -> Result<(ArtifactMeta, Vec<ArtifactMeta>)> {
    let primary = match format {
        OutputFormat::Markdown => write_atomic(
            dir,
            &format!("{ARTICLE_STEM}.md"),
            render_markdown(manuscript).as_bytes(),
        )?,
        _ => write_atomic(dir, &format!("{ARTICLE_STEM}.docx"), &render_docx(manuscript)?)?,
    };
    let json = write_json(dir, "manuscript.json", manuscript)?;
    let artifacts = vec![primary.clone(), json];

    let manifest = Manifest {
        invocation_id: invocation_id.to_string(),
        created_at: Utc::now().to_rfc3339(),
        requested_format: requested,
        rendered_format: format,
        title: manuscript.title(),
        word_count: manuscript.word_count(),
        reference_count: manuscript.reference_count(),
        artifacts: &artifacts,
    };
    write_json(dir, "manifest.json", &manifest)?;

    Ok((primary, artifacts))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use thesisforge_shared::{DocumentFormat, RawDocument, Reference, SourceType};

    use super::*;
    use crate::assembler::{AssemblyInput, AuthorInfo, ChapterSelection, FrontMatter, assemble};

    fn manuscript() -> Manuscript {
        let mut selection = ChapterSelection::default();
        for t in ChapterType::MANDATORY {
            selection.chapters.insert(
                t,
                thesisforge_shared::Chapter::new(t, t.heading(), format!("Isi {} & <lainnya>.\n\nParagraf kedua.", t.as_str())),
            );
        }
        assemble(AssemblyInput {
            author: AuthorInfo {
                author_name: "Rina Putri".into(),
                coauthors: "Budi Santoso".into(),
                affiliation: "Universitas Negeri Makassar".into(),
                email: "rina@example.ac.id".into(),
            },
            front_matter: FrontMatter {
                title: "JUDUL ARTIKEL".into(),
                abstracts: BTreeMap::from([(Language::English, "An abstract.".to_string())]),
                keywords: BTreeMap::from([(Language::English, vec!["media".to_string(), "learning".to_string()])]),
            },
            selection,
            references: vec![Reference {
                authors: vec!["Brown, P.".into()],
                year: 2020,
                title: "Advances".into(),
                source: "Journal of AI, 1(2)".into(),
                source_type: SourceType::Journal,
                raw: String::new(),
            }],
            min_references: 1,
            words_per_page: 500,
            policy_violation: None,
        })
        .unwrap()
    }

    #[test]
    fn markdown_follows_article_layout() {
        let md = render_markdown(&manuscript());
        assert!(md.starts_with("# JUDUL ARTIKEL\n"));
        assert!(md.contains("Rina Putri¹*, Budi Santoso"));
        assert!(md.contains("**Keywords:** media, learning"));
        let order: Vec<usize> = ["## ABSTRACT", "## PENDAHULUAN", "## METODE PENELITIAN", "## UCAPAN TERIMA KASIH", "## DAFTAR PUSTAKA"]
            .iter()
            .map(|h| md.find(h).unwrap())
            .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]));
        assert!(md.trim_end().ends_with("Brown, P. (2020). Advances. Journal of AI, 1(2)."));
    }

    #[test]
    fn docx_reads_back_through_the_extractor() {
        let bytes = render_docx(&manuscript()).unwrap();
        let doc = thesisforge_extract::extract(&RawDocument::new("out.docx", bytes, DocumentFormat::Docx)).unwrap();
        assert!(doc.text.contains("Isi methods & <lainnya>."));
        assert!(doc.headings.iter().any(|h| h.text == "METODE PENELITIAN" && h.level == 1));
        assert!(doc.headings.iter().any(|h| h.text == "JUDUL ARTIKEL"));
    }

    #[test]
    fn pdf_requests_fall_back_to_docx() {
        assert_eq!(effective_format(OutputFormat::Pdf), OutputFormat::Docx);
        assert_eq!(effective_format(OutputFormat::Markdown), OutputFormat::Markdown);
    }

    #[test]
    fn artifacts_are_written_with_checksums() {
        let root = std::env::temp_dir().join(format!("thesisforge-render-{}", uuid::Uuid::now_v7()));
        let id = InvocationId::new();

        let reference = write_artifacts(&manuscript(), &root, &id, OutputFormat::Pdf).unwrap();
        assert_eq!(reference.format, OutputFormat::Docx);
        assert_eq!(reference.primary.filename, "journal_article.docx");
        assert!(reference.primary_path().exists());
        assert_eq!(reference.primary.sha256.len(), 64);

        let dir = root.join(id.to_string());
        let manifest: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join("manifest.json")).unwrap()).unwrap();
        assert_eq!(manifest["requested_format"], "pdf");
        assert_eq!(manifest["rendered_format"], "docx");
        assert_eq!(manifest["artifacts"].as_array().unwrap().len(), 2);
        assert!(!dir.join(".journal_article.docx.tmp").exists());
        assert!(!staging_dir(&root, &id).exists());

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn failed_manifest_write_leaves_no_partial_output() {
        let root = std::env::temp_dir().join(format!("thesisforge-render-{}", uuid::Uuid::now_v7()));
        let id = InvocationId::new();
        // A directory where manifest.json should go makes the final rename fail.
        std::fs::create_dir_all(staging_dir(&root, &id).join("manifest.json")).unwrap();

        let result = write_artifacts(&manuscript(), &root, &id, OutputFormat::Markdown);
        assert!(result.is_err());
        assert!(!root.join(id.to_string()).exists());
        assert!(!staging_dir(&root, &id).exists());

        std::fs::remove_dir_all(&root).ok();
    }
}
