//! Where participants put the layers they complete. Each participant owns
//! its own result sink; layers are written in the order the participant
//! computes them, so a file per rank holds every `P`-th layer.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{prelude::*, BufWriter};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub space_step: f64,
    pub time_step: f64,
    /// Number of layers including the initial one.
    pub layer_count: usize,
    pub layer_size: usize,
}

pub trait ResultSink {
    fn put_header(&mut self, header: &Header) -> Result<()>;

    fn put_layer(&mut self, layer: usize, values: &[f64]) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: ResultSink + ?Sized> ResultSink for Box<T> {
    fn put_header(&mut self, header: &Header) -> Result<()> {
        (**self).put_header(header)
    }

    fn put_layer(&mut self, layer: usize, values: &[f64]) -> Result<()> {
        (**self).put_layer(layer, values)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

/// File name used by a participant for the given prefix and extension.
pub fn rank_file_name(prefix: &str, rank: usize, extension: &str) -> String {
    format!("{}-{}.{}", prefix, rank, extension)
}




/**
 * Plain text results: a header of two lines, `h tau` and `layers size`,
 * followed by one line per layer holding its index and its values.
 */
pub struct TextResults<W: Write> {
    out: W,
}

impl TextResults<BufWriter<File>> {
    pub fn create(prefix: &str, rank: usize) -> Result<Self> {
        let file = File::create(rank_file_name(prefix, rank, "txt"))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> TextResults<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ResultSink for TextResults<W> {
    fn put_header(&mut self, header: &Header) -> Result<()> {
        writeln!(self.out, "{} {}", header.space_step, header.time_step)?;
        writeln!(self.out, "{} {}", header.layer_count, header.layer_size)?;
        Ok(())
    }

    fn put_layer(&mut self, layer: usize, values: &[f64]) -> Result<()> {
        write!(self.out, "{}", layer)?;
        for value in values {
            write!(self.out, " {}", value)?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(self.out.flush()?)
    }
}




#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Record {
    Header(Header),
    Layer { index: usize, values: Vec<f64> },
}

/**
 * Binary results: a stream of CBOR-encoded `Record`s.
 */
pub struct CborResults<W: Write> {
    out: W,
}

impl CborResults<BufWriter<File>> {
    pub fn create(prefix: &str, rank: usize) -> Result<Self> {
        let file = File::create(rank_file_name(prefix, rank, "cbor"))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> CborResults<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn put(&mut self, record: &Record) -> Result<()> {
        ciborium::ser::into_writer(record, &mut self.out).map_err(|e| Error::Codec(format!("{:?}", e)))
    }
}

impl<W: Write> ResultSink for CborResults<W> {
    fn put_header(&mut self, header: &Header) -> Result<()> {
        self.put(&Record::Header(*header))
    }

    fn put_layer(&mut self, layer: usize, values: &[f64]) -> Result<()> {
        self.put(&Record::Layer {
            index: layer,
            values: values.to_vec(),
        })
    }

    fn finish(&mut self) -> Result<()> {
        Ok(self.out.flush()?)
    }
}

/// Read back every record of a CBOR results stream.
pub fn read_cbor_records<R: BufRead>(mut reader: R) -> Result<Vec<Record>> {
    let mut records = Vec::new();

    while !reader.fill_buf()?.is_empty() {
        let record = ciborium::de::from_reader(&mut reader).map_err(|e| Error::Codec(format!("{:?}", e)))?;
        records.push(record);
    }
    Ok(records)
}




/**
 * Keeps every layer in memory, keyed by layer index.
 */
#[derive(Clone, Debug, Default)]
pub struct MemoryResults {
    pub header: Option<Header>,
    pub layers: BTreeMap<usize, Vec<f64>>,
}

impl MemoryResults {
    /// Merge the layers of several participants into one map.
    pub fn merge<I: IntoIterator<Item = MemoryResults>>(parts: I) -> BTreeMap<usize, Vec<f64>> {
        parts.into_iter().flat_map(|part| part.layers).collect()
    }
}

impl ResultSink for MemoryResults {
    fn put_header(&mut self, header: &Header) -> Result<()> {
        self.header = Some(*header);
        Ok(())
    }

    fn put_layer(&mut self, layer: usize, values: &[f64]) -> Result<()> {
        self.layers.insert(layer, values.to_vec());
        Ok(())
    }
}




/**
 * Ignores all results.
 */
pub struct NoResults;

impl ResultSink for NoResults {
    fn put_header(&mut self, _header: &Header) -> Result<()> {
        Ok(())
    }

    fn put_layer(&mut self, _layer: usize, _values: &[f64]) -> Result<()> {
        Ok(())
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;

    const HEADER: Header = Header {
        space_step: 0.5,
        time_step: 0.25,
        layer_count: 3,
        layer_size: 2,
    };

    #[test]
    fn text_results_have_two_header_lines_and_a_line_per_layer() {
        let mut results = TextResults::new(Vec::new());
        results.put_header(&HEADER).unwrap();
        results.put_layer(0, &[1.0, 0.5]).unwrap();
        results.put_layer(2, &[0.0, 1.5]).unwrap();
        results.finish().unwrap();

        let text = String::from_utf8(results.into_inner()).unwrap();
        assert_eq!(text, "0.5 0.25\n3 2\n0 1 0.5\n2 0 1.5\n");
    }

    #[test]
    fn cbor_results_read_back_in_order() {
        let mut results = CborResults::new(Vec::new());
        results.put_header(&HEADER).unwrap();
        results.put_layer(1, &[0.125, -2.0]).unwrap();

        let records = read_cbor_records(&results.into_inner()[..]).unwrap();
        assert_eq!(
            records,
            vec![
                Record::Header(HEADER),
                Record::Layer { index: 1, values: vec![0.125, -2.0] },
            ]
        );
    }

    #[test]
    fn memory_results_merge_by_layer_index() {
        let mut a = MemoryResults::default();
        let mut b = MemoryResults::default();
        a.put_layer(2, &[2.0]).unwrap();
        b.put_layer(1, &[1.0]).unwrap();
        let merged = MemoryResults::merge(vec![a, b]);
        assert_eq!(merged.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
    }
}
