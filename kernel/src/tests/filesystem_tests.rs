// File handle and offset-addressed I/O coverage (SPEC_FULL.md §4.8, §6).

#[cfg(test)]
mod tests {
    use crate::fs::mem_fs::MemFs;
    use crate::fs::FileSystem;

    #[test]
    fn default_offset_methods_are_consistent_with_whole_file_ops() {
        let mut fs = MemFs::new();
        fs.write_file("/greeting", b"hello world").unwrap();

        assert_eq!(fs.file_length("/greeting").unwrap(), 11);

        let mut buf = [0u8; 5];
        let n = fs.read_at("/greeting", 6, &mut buf).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buf, b"world");

        fs.write_at("/greeting", 6, b"there").unwrap();
        assert_eq!(fs.read_file("/greeting").unwrap(), b"hello there");
    }

    #[test]
    fn read_at_past_eof_returns_short_read() {
        let mut fs = MemFs::new();
        fs.write_file("/short", b"abc").unwrap();

        let mut buf = [0u8; 8];
        let n = fs.read_at("/short", 1, &mut buf).unwrap();
        assert_eq!(n, 2);
        assert_eq!(&buf[..2], b"bc");
    }
}
