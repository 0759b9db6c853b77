//! Transformer contract
//!
//! A transformer is the immutable product of a trained estimator. It maps one
//! input to zero or more outputs, handing each output to a callback before
//! `execute` returns, and can be persisted to an [`Archive`] and rebuilt from
//! one without the training data.

use std::borrow::Borrow;

use crate::archive::Archive;
use crate::error::Result;

/// A trained, persistable mapping from inputs to outputs
pub trait Transformer {
    /// Type of one input
    type Input: ?Sized;

    /// Type of one output
    type Output;

    /// Transform one input, passing every output to `callback`
    fn execute(
        &mut self,
        input: &Self::Input,
        callback: &mut dyn FnMut(Self::Output),
    ) -> Result<()>;

    /// Emit any trailing state once all inputs were executed
    fn flush(&mut self, _callback: &mut dyn FnMut(Self::Output)) -> Result<()> {
        Ok(())
    }

    /// Write the version header and payload
    fn save(&self, archive: &mut Archive) -> Result<()>;

    /// Rebuild a transformer written by [`Transformer::save`]
    fn load(archive: &mut Archive) -> Result<Self>
    where
        Self: Sized;

    /// Transform one input and collect its outputs
    fn transform(&mut self, input: &Self::Input) -> Result<Vec<Self::Output>> {
        let mut outputs = Vec::new();
        self.execute(input, &mut |output| outputs.push(output))?;
        Ok(outputs)
    }

    /// Serialize into a committed byte vector
    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut archive = Archive::new();
        self.save(&mut archive)?;
        archive.commit()
    }

    /// Load from a committed byte vector, requiring every byte be consumed
    fn from_bytes(bytes: Vec<u8>) -> Result<Self>
    where
        Self: Sized,
    {
        let mut archive = Archive::from_bytes(bytes);
        let transformer = Self::load(&mut archive)?;
        archive.ensure_consumed()?;
        Ok(transformer)
    }

    /// Load from borrowed bytes without copying them, requiring every byte be consumed
    fn from_slice(bytes: &[u8]) -> Result<Self>
    where
        Self: Sized,
    {
        let mut archive = Archive::from_slice(bytes);
        let transformer = Self::load(&mut archive)?;
        archive.ensure_consumed()?;
        Ok(transformer)
    }
}

/// Execute `transformer` over every input, then flush, collecting all outputs
pub fn transform_all<T, I>(transformer: &mut T, inputs: I) -> Result<Vec<T::Output>>
where
    T: Transformer + ?Sized,
    I: IntoIterator,
    I::Item: Borrow<T::Input>,
{
    let mut outputs = Vec::new();
    for input in inputs {
        transformer.execute(input.borrow(), &mut |output| outputs.push(output))?;
    }
    transformer.flush(&mut |output| outputs.push(output))?;
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::traits::Archivable;

    /// Emits each input `repeat` times and a trailing count on flush
    #[derive(Debug, PartialEq)]
    struct Repeat {
        repeat: u8,
        seen: u32,
    }

    impl Transformer for Repeat {
        type Input = u32;
        type Output = u32;

        fn execute(&mut self, input: &u32, callback: &mut dyn FnMut(u32)) -> Result<()> {
            self.seen += 1;
            for _ in 0..self.repeat {
                callback(*input);
            }
            Ok(())
        }

        fn flush(&mut self, callback: &mut dyn FnMut(u32)) -> Result<()> {
            callback(self.seen);
            Ok(())
        }

        fn save(&self, archive: &mut Archive) -> Result<()> {
            archive.write_version(1, 0)?;
            self.repeat.serialize(archive)
        }

        fn load(archive: &mut Archive) -> Result<Self> {
            archive.expect_version(1, 0)?;
            Ok(Self {
                repeat: u8::deserialize(archive)?,
                seen: 0,
            })
        }
    }

    #[test]
    fn test_transform_all_flushes() {
        let mut repeat = Repeat { repeat: 2, seen: 0 };
        let out = transform_all(&mut repeat, [7u32, 9]).unwrap();
        assert_eq!(out, vec![7, 7, 9, 9, 2]);
    }

    #[test]
    fn test_bytes_round_trip() {
        let repeat = Repeat { repeat: 3, seen: 0 };
        let bytes = repeat.to_bytes().unwrap();
        assert_eq!(bytes.len(), 5);
        assert_eq!(Repeat::from_bytes(bytes).unwrap(), repeat);
    }

    #[test]
    fn test_from_bytes_rejects_trailing_data() {
        let mut bytes = Repeat { repeat: 1, seen: 0 }.to_bytes().unwrap();
        bytes.push(0);
        assert!(matches!(Repeat::from_bytes(bytes), Err(Error::Serialization(_))));
    }

    #[test]
    fn test_slice_loading_matches_owned_loading() {
        let repeat = Repeat { repeat: 4, seen: 0 };
        let mut bytes = repeat.to_bytes().unwrap();
        assert_eq!(Repeat::from_slice(&bytes).unwrap(), repeat);

        bytes.push(0);
        assert!(matches!(Repeat::from_slice(&bytes), Err(Error::Serialization(_))));
        assert!(matches!(Repeat::from_slice(&bytes[..3]), Err(Error::Serialization(_))));
    }

    #[test]
    fn test_load_rejects_unknown_version() {
        let mut archive = Archive::new();
        archive.write_version(2, 0).unwrap();
        1u8.serialize(&mut archive).unwrap();
        let err = Repeat::from_bytes(archive.commit().unwrap()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion { major: 2, minor: 0 }));
    }
}
