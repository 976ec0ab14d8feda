use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pdfweave::objects::{Dictionary, Object};
use pdfweave::{
    DocumentContext, ObjectSink, Page, PdfReader, PdfVersion, PreserveCatalogEntries, Rectangle,
    ResourceCategory, SourceDocument, WriterConfig,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "pdfweave",
    about = "Assemble PDF documents and append pages to existing ones",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new PDF
    Create {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Number of pages to write
        #[arg(short, long, default_value_t = 1)]
        pages: usize,

        /// Text drawn on every page
        #[arg(short, long)]
        text: Option<String>,

        /// Document title
        #[arg(long)]
        title: Option<String>,

        /// Document author
        #[arg(long)]
        author: Option<String>,

        /// Link annotation placed on the first page
        #[arg(long)]
        link: Option<String>,

        /// Finish with a cross-reference stream instead of a table
        #[arg(long)]
        xref_stream: bool,

        /// PDF version, 1.0 to 1.7 or 2.0
        #[arg(long, default_value = "1.7")]
        pdf_version: String,

        /// Maximum kids per page tree node
        #[arg(long, default_value_t = 10)]
        max_kids: usize,
    },

    /// Append pages to an existing PDF as an incremental update
    Append {
        /// Input PDF file
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Number of pages to append
        #[arg(short, long, default_value_t = 1)]
        pages: usize,

        /// Text drawn on every appended page
        #[arg(short, long)]
        text: Option<String>,

        /// Link annotation placed on the first appended page
        #[arg(long)]
        link: Option<String>,

        /// Version of the updated document, raised in the catalog when
        /// higher than the input's
        #[arg(long)]
        pdf_version: Option<String>,
    },

    /// Show trailer and page tree information of a PDF
    Inspect {
        /// Input PDF file
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdfweave=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Create {
            output,
            pages,
            text,
            title,
            author,
            link,
            xref_stream,
            pdf_version,
            max_kids,
        } => {
            let config = WriterConfig::default()
                .with_version(parse_version(&pdf_version)?)
                .with_xref_streams(xref_stream)
                .with_max_page_tree_kids(max_kids);
            let file = File::create(&output)
                .with_context(|| format!("cannot create {}", output.display()))?;

            let mut context = DocumentContext::new(BufWriter::new(file), config);
            context.set_output_file_information(output.display().to_string());
            context.info_mut().title = title;
            context.info_mut().author = author;
            context.info_mut().creator = Some(format!("pdfweave {}", pdfweave::VERSION));
            context.write_header()?;

            write_pages(&mut context, pages, text.as_deref(), link.as_deref())?;
            context.finalize_new_pdf()?;
            context.flush()?;

            info!(output = %output.display(), pages, "created document");
            println!("PDF created successfully: {}", output.display());
        }

        Commands::Append {
            input,
            output,
            pages,
            text,
            link,
            pdf_version,
        } => {
            if same_file(&input, &output) {
                bail!("output must differ from input {}", input.display());
            }

            let source = PdfReader::open(&input)
                .with_context(|| format!("cannot read {}", input.display()))?;
            let version = match pdf_version {
                Some(version) => parse_version(&version)?,
                None => source.version(),
            };
            let config = WriterConfig::default().with_version(version);
            let file = File::create(&output)
                .with_context(|| format!("cannot create {}", output.display()))?;

            let mut context =
                DocumentContext::append_to(BufWriter::new(file), source.data(), config)?;
            context.set_output_file_information(output.display().to_string());
            context.setup_modified_file(&source)?;
            if !source.is_encrypted() {
                context.add_extension(Box::new(PreserveCatalogEntries::from_source(&source)?));
            }

            write_pages(&mut context, pages, text.as_deref(), link.as_deref())?;
            context.finalize_modified_pdf(&source)?;
            context.flush()?;

            let added = context.catalog().page_count();
            info!(input = %input.display(), added, "appended pages");
            println!(
                "Appended {added} page(s) to {}: {}",
                input.display(),
                output.display()
            );
        }

        Commands::Inspect { input } => {
            let reader = PdfReader::open(&input)
                .with_context(|| format!("cannot read {}", input.display()))?;
            inspect(&input, &reader)?;
        }
    }

    Ok(())
}

fn parse_version(value: &str) -> Result<PdfVersion> {
    value
        .parse()
        .with_context(|| format!("invalid PDF version '{value}'"))
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn write_pages<W: Write>(
    context: &mut DocumentContext<W>,
    count: usize,
    text: Option<&str>,
    link: Option<&str>,
) -> Result<()> {
    if let Some(url) = link {
        context.attach_url_link_to_current_page(
            url,
            Rectangle::from_position_and_size(72.0, 680.0, 200.0, 20.0),
        )?;
    }

    for number in 1..=count {
        let mut page = Page::letter();
        if let Some(text) = text {
            let font = context.add_extended_resource_mapping(
                page.resources_mut(),
                ResourceCategory::Font,
                Box::new(
                    |name: &str, fonts: &mut Dictionary, sink: &mut dyn ObjectSink| {
                        let mut font = Dictionary::typed("Font");
                        font.set("Subtype", Object::name("Type1"));
                        font.set("BaseFont", Object::name("Helvetica"));
                        font.set("Encoding", Object::name("WinAnsiEncoding"));
                        let id = sink.write_new(&Object::Dictionary(font))?;
                        fonts.set(name, id);
                        Ok::<(), pdfweave::PdfError>(())
                    },
                ),
            );
            let content = format!(
                "BT /{font} 24 Tf 72 720 Td ({}) Tj ET",
                escape_text(text)
            );
            context.write_page_content(&mut page, content.as_bytes())?;
        }
        let id = context.write_page(&page)?;
        tracing::debug!(page = %id, number, "wrote page");
    }
    Ok(())
}

/// Escape a literal string body. Anything outside printable ASCII becomes `?`.
fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '(' | ')' | '\\' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            ' '..='~' => escaped.push(ch),
            _ => escaped.push('?'),
        }
    }
    escaped
}

fn inspect(path: &Path, reader: &PdfReader) -> Result<()> {
    println!("PDF Information for: {}", path.display());
    println!("==========================================");
    println!("PDF Version: {}", reader.version());
    println!("Header Version: {}", reader.header_version());
    if let Some(root) = reader.trailer().get_reference("Root") {
        println!("Root: {root}");
    }
    println!("Pages: {}", reader.page_count()?);
    println!(
        "Cross-reference: {}",
        if reader.uses_xref_stream() {
            "stream"
        } else {
            "table"
        }
    );
    println!("Objects: {}", reader.object_count());
    println!("Encrypted: {}", if reader.is_encrypted() { "Yes" } else { "No" });

    let trailer = reader.trailer();
    match trailer.get_integer("Prev") {
        Some(prev) => println!("Incremental update: Yes (previous section at {prev})"),
        None => println!("Incremental update: No"),
    }

    if let Some(info) = trailer.get_reference("Info") {
        if let Some(info) = reader.parse_object(info.number())?.as_dict() {
            for key in ["Title", "Author", "Subject", "Creator", "Producer"] {
                if let Some(value) = info.get_text(key) {
                    println!("{key}: {value}");
                }
            }
        }
    }
    Ok(())
}
