use std::fs::File;
use std::io::BufReader;
use std::str::FromStr;

use quick_xml::events::Event;
use quick_xml::Reader;
use typed_builder::TypedBuilder;

/// Offsets the traffic simulator applied to shift the road network to its
/// local origin. Subtracting them restores offset-corrected planar
/// coordinates for every trace position.
#[derive(Copy, Clone, Default, TypedBuilder)]
pub(crate) struct SumoOffsets {
    x_offset: f64,
    y_offset: f64,
}

impl SumoOffsets {
    pub(crate) fn subtract_x_offset(&self, input: f64) -> f64 {
        input - self.x_offset
    }

    pub(crate) fn subtract_y_offset(&self, input: f64) -> f64 {
        input - self.y_offset
    }
}

pub(crate) struct OffsetReader {
    net_file: Reader<BufReader<File>>,
    offsets: Option<SumoOffsets>,
}

impl OffsetReader {
    pub(crate) fn new(input_network: &str) -> Self {
        let net_file = Reader::from_file(input_network).expect("Failed to create XML reader");
        Self {
            net_file,
            offsets: None,
        }
    }

    pub(crate) fn peek_offsets(&self) -> SumoOffsets {
        match self.offsets {
            Some(offsets) => offsets,
            None => panic!("Cannot peek offsets before reading the network file"),
        }
    }

    /// Scans the network file until the location tag is found and reads the
    /// netOffset attribute from it.
    pub(crate) fn initialize(&mut self) {
        let mut buffer = Vec::new();
        loop {
            match self.net_file.read_event_into(&mut buffer) {
                Err(error) => panic!(
                    "Failed to read network xml at position {} with error {:?}",
                    self.net_file.buffer_position(),
                    error
                ),
                Ok(Event::Empty(tag)) => {
                    if tag.name().as_ref() == b"location" {
                        self.read_offsets(&tag);
                        return;
                    }
                }
                Ok(Event::Eof) => {
                    panic!("Network file has no location tag with offsets")
                }
                _ => {}
            }
            buffer.clear();
        }
    }

    fn read_offsets(&mut self, location_tag: &quick_xml::events::BytesStart) {
        for attribute in location_tag.attributes() {
            let attribute = attribute.expect("failed to read location attribute");
            if attribute.key.as_ref() != b"netOffset" {
                continue;
            }
            let offsets =
                std::str::from_utf8(&attribute.value).expect("failed to read offset value");
            let x_offset = offsets
                .split(",")
                .take(1)
                .last()
                .expect("failed to read x offset");
            let y_offset = offsets.split(",").last().expect("failed to read y offset");

            let x = f64::from_str(x_offset).expect("failed to parse x offset");
            let y = f64::from_str(y_offset.trim()).expect("failed to parse y offset");
            self.offsets = Some(SumoOffsets::builder().x_offset(x).y_offset(y).build());
        }
        if self.offsets.is_none() {
            panic!("Location tag has no netOffset attribute");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn reads_net_offsets() {
        let net_file = std::env::temp_dir().join(format!(
            "netprep_net_offsets_{}.net.xml",
            std::process::id()
        ));
        let mut file = std::fs::File::create(&net_file).expect("failed to create net file");
        writeln!(
            file,
            r#"<net version="1.16">
    <location netOffset="-342498.81,-5630866.43" convBoundary="0.00,0.00,7838.05,6241.39" origBoundary="13.50,50.79,13.63,50.86" projParameter="+proj=utm +zone=33"/>
</net>"#
        )
        .expect("failed to write net file");

        let mut reader = OffsetReader::new(net_file.to_str().expect("invalid path"));
        reader.initialize();
        let offsets = reader.peek_offsets();
        assert_eq!(offsets.subtract_x_offset(0.0), 342498.81);
        assert_eq!(offsets.subtract_y_offset(0.0), 5630866.43);
        std::fs::remove_file(&net_file).expect("failed to remove net file");
    }
}
