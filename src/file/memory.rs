use super::{bounded, Backend};
use crate::Result;

/// An owned buffer.
///
/// The only writable backend: mutation plans are flushed into it through
/// [`Backend::replace`].
#[derive(Debug)]
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    /// Takes ownership of `data`.
    pub fn new(data: Vec<u8>) -> Memory {
        Memory { data }
    }
}

impl Backend for Memory {
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        bounded(&self.data, offset, len)
    }

    fn data(&self) -> &[u8] {
        self.data.as_slice()
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn data_mut(&mut self) -> Result<&mut [u8]> {
        Ok(self.data.as_mut_slice())
    }

    fn replace(&mut self, data: Vec<u8>) -> Result<()> {
        self.data = data;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error::OutOfBounds;

    #[test]
    fn memory() {
        let mut data = vec![0xCC_u8; 1048];
        data[10..15].fill(0xBB);

        let memory = Memory::new(data);

        assert_eq!(memory.len(), 1048);
        assert_eq!(memory.data()[0], 0xCC);
        assert_eq!(
            memory.data_slice(10, 5).unwrap(),
            &[0xBB, 0xBB, 0xBB, 0xBB, 0xBB]
        );

        assert!(memory
            .data_slice(u32::MAX as usize, u32::MAX as usize)
            .is_err());
        assert!(memory.data_slice(0, 2048).is_err());
    }

    #[test]
    fn memory_empty_buffer() {
        let memory = Memory::new(vec![]);

        assert_eq!(memory.len(), 0);
        assert!(memory.data_slice(0, 1).is_err());
        assert!(memory.data_slice(1, 0).is_err());
        let empty_slice: &[u8] = &[];
        assert_eq!(memory.data_slice(0, 0).unwrap(), empty_slice);
    }

    #[test]
    fn memory_offset_overflow() {
        let memory = Memory::new(vec![0x00; 100]);

        assert!(matches!(memory.data_slice(usize::MAX, 1), Err(OutOfBounds)));
        assert!(matches!(memory.data_slice(100, 1), Err(OutOfBounds)));
        assert!(matches!(memory.data_slice(99, 2), Err(OutOfBounds)));
    }

    #[test]
    fn memory_write_and_replace() {
        let mut memory = Memory::new(vec![0x00; 4]);

        memory.data_mut().unwrap()[1] = 0x7F;
        assert_eq!(memory.data(), &[0x00, 0x7F, 0x00, 0x00]);

        memory.replace(vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(memory.len(), 6);
        assert_eq!(memory.data_slice(4, 2).unwrap(), &[5, 6]);
    }
}
