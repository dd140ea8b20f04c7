//! Re-serialise a staged delimited file into the canonical quoted form

use super::Result;
use csv_async::{AsyncReaderBuilder, AsyncWriterBuilder, ByteRecord, QuoteStyle, Terminator};
use std::path::Path;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteOptions {
    /// Header row written before the data rows
    pub add_header: Option<Vec<String>>,
    /// Field separator of the input, `,` when unset
    pub separator: Option<u8>,
}

impl RewriteOptions {
    /// Whether a plain move would produce the same file
    pub fn is_noop(&self) -> bool {
        self.add_header.is_none() && self.separator.is_none()
    }
}

/// Copy every record of `reader` to `writer`, quoting all fields.
///
/// Returns the number of data rows written, not counting the injected header.
pub async fn rewrite<R, W>(reader: R, writer: W, options: &RewriteOptions) -> Result<u64>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let mut input = AsyncReaderBuilder::new()
        .delimiter(options.separator.unwrap_or(b','))
        .has_headers(false)
        .flexible(true)
        .create_reader(reader);
    let mut output = AsyncWriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .double_quote(true)
        .terminator(Terminator::Any(b'\n'))
        .flexible(true)
        .create_writer(writer);

    if let Some(ref header) = options.add_header {
        output.write_record(header).await?;
    }

    let mut record = ByteRecord::new();
    let mut rows = 0u64;
    while input.read_byte_record(&mut record).await? {
        output.write_byte_record(&record).await?;
        rows += 1;
    }
    output.flush().await?;

    Ok(rows)
}

pub async fn rewrite_file(
    source: impl AsRef<Path>,
    destination: impl AsRef<Path>,
    options: &RewriteOptions,
) -> Result<u64> {
    let (source, destination) = (source.as_ref(), destination.as_ref());
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let input = tokio::fs::File::open(source).await?;
    let mut output = tokio::io::BufWriter::new(tokio::fs::File::create(destination).await?);
    let rows = rewrite(input, &mut output, options).await?;
    output.flush().await?;

    debug!(
        source = %source.display(),
        destination = %destination.display(),
        rows,
        "Rewrote delimited file"
    );
    Ok(rows)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    async fn run(input: &str, options: RewriteOptions) -> (u64, String) {
        let mut out = Vec::new();
        let rows = rewrite(input.as_bytes(), &mut out, &options).await.unwrap();
        (rows, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_quotes_every_field() {
        let (rows, out) = run("a,b\n1,say \"hi\"\n", RewriteOptions::default()).await;
        assert_eq!(rows, 2);
        assert_eq!(out, "\"a\",\"b\"\n\"1\",\"say \"\"hi\"\"\"\n");
    }

    #[tokio::test]
    async fn test_injects_header_and_remaps_separator() {
        let options = RewriteOptions {
            add_header: Some(vec!["id".to_string(), "name".to_string()]),
            separator: Some(b'\t'),
        };
        let (rows, out) = run("1\tx,y\n2\tz\n", options).await;
        assert_eq!(rows, 2);
        assert_eq!(out, "\"id\",\"name\"\n\"1\",\"x,y\"\n\"2\",\"z\"\n");
    }

    #[tokio::test]
    async fn test_rewrite_file_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.csv");
        let destination = dir.path().join("nested/out.csv");
        tokio::fs::write(&source, "x;y\n").await.unwrap();

        let options = RewriteOptions {
            add_header: None,
            separator: Some(b';'),
        };
        assert!(!options.is_noop());
        let rows = rewrite_file(&source, &destination, &options).await.unwrap();

        assert_eq!(rows, 1);
        let written = tokio::fs::read_to_string(&destination).await.unwrap();
        assert_eq!(written, "\"x\",\"y\"\n");
    }
}
