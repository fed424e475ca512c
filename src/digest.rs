use crypto::
{
    sha2::Sha256,
    digest::Digest as CryptoDigest,
};
use std::fmt;
use std::io::Read;

use num_bigint::BigUint;
use num_traits::
{
    ToPrimitive,
    identities::{Zero, One},
};

use crate::fs::{FileSystem, ReadWriteError, SystemError};

#[derive(Debug, PartialEq)]
pub enum FromHumanReadableError
{
    InvalidLength,
    Overflow,
    InvalidCharacter(char),
}

impl fmt::Display for FromHumanReadableError
{
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result
    {
        match self
        {
            FromHumanReadableError::InvalidLength =>
                write!(formatter, "Invalid length, must be 43"),

            FromHumanReadableError::Overflow =>
                write!(formatter, "Encodes a value too big to fit in a 256-bit unsigned integer"),

            FromHumanReadableError::InvalidCharacter(character) =>
                write!(formatter, "Invalid character: {} must be 0-9 a-z A-Z", character),
        }
    }
}

const ALPHABET: [u8; 62] =
[
    48, 49, 50, 51, 52, 53, 54, 55, 56, 57,
    97, 98, 99, 100, 101, 102, 103, 104, 105, 106, 107, 108, 109, 110, 111, 112, 113, 114, 115, 116, 117, 118, 119, 120, 121, 122,
    65, 66, 67, 68, 69, 70, 71, 72, 73, 74, 75, 76, 77, 78, 79, 80, 81, 82, 83, 84, 85, 86, 87, 88, 89, 90
];

fn decode62(tag: &str) -> Result<[u8; 32], FromHumanReadableError>
{
    if tag.len() != 43
    {
        return Err(FromHumanReadableError::InvalidLength);
    }

    let mut n = BigUint::zero();
    let mut d = BigUint::one();
    for c in tag.chars()
    {
        n += &d *
        match c
        {
            '0'..='9' => c as u32 - '0' as u32,
            'a'..='z' => c as u32 - 'a' as u32 + 10,
            'A'..='Z' => c as u32 - 'A' as u32 + 36,
            _ => return Err(FromHumanReadableError::InvalidCharacter(c)),
        };
        d *= 62u32;
    }

    let v = n.to_bytes_le();
    if v.len() > 32
    {
        return Err(FromHumanReadableError::Overflow);
    }

    let mut result = [0u8; 32];
    for (i, byte) in v.into_iter().enumerate()
    {
        result[i] = byte;
    }

    Ok(result)
}

fn encode62(bytes: &[u8; 32]) -> String
{
    let mut n = BigUint::from_bytes_le(bytes);

    let mut buffer = [48u8; 43];
    let mut i = 0;
    while n > BigUint::zero()
    {
        buffer[i] = ALPHABET[(&n % 62u32).to_u32().unwrap() as usize];
        i += 1;
        n /= 62u32;
    }

    std::str::from_utf8(&buffer).unwrap().to_string()
}

/*  256-bit content hash.  Construct one via a DigestFactory and feed it
    strings, other digests, file contents, or whole directory trees. */
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Digest
{
    sha: [u8; 32],
}

impl Digest
{
    pub fn human_readable(&self) -> String
    {
        encode62(&self.sha)
    }

    pub fn from_human_readable(text: &str) -> Result<Digest, FromHumanReadableError>
    {
        Ok(Digest{ sha: decode62(text)? })
    }
}

impl fmt::Display for Digest
{
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result
    {
        write!(formatter, "{}", self.human_readable())
    }
}

pub struct DigestFactory
{
    dig: Sha256,
}

impl DigestFactory
{
    pub fn new() -> DigestFactory
    {
        DigestFactory{ dig: Sha256::new() }
    }

    pub fn from_str(text: &str) -> DigestFactory
    {
        let mut factory = DigestFactory::new();
        factory.input_str(text);
        factory
    }

    pub fn input_str(&mut self, text: &str)
    {
        self.dig.input(text.as_bytes());
    }

    pub fn input_digest(&mut self, digest: &Digest)
    {
        self.dig.input(&digest.sha);
    }

    pub fn result(&mut self) -> Digest
    {
        let mut out = [0u8; 32];
        self.dig.result(&mut out);
        Digest{ sha: out }
    }

    /*  Streams a file's content through the hasher in fixed-size chunks
        so hashing never needs the whole file in memory at once. */
    pub fn from_file<FsType: FileSystem>(
        file_system: &FsType,
        path: &str,
    )
    -> Result<DigestFactory, ReadWriteError>
    {
        let mut reader = file_system.open(path).map_err(ReadWriteError::SystemError)?;
        let mut buffer = [0u8; 256];
        let mut dig = Sha256::new();
        loop
        {
            match reader.read(&mut buffer)
            {
                Ok(0) => return Ok(DigestFactory{ dig }),
                Ok(size) => dig.input(&buffer[..size]),
                Err(error) => return Err(ReadWriteError::IoError(error)),
            }
        }
    }

    /*  Hashes the sorted directory listing, then folds in each entry's
        own digest (recursing into sub-directories), giving a digest
        sensitive to both structure and content. */
    pub fn from_directory<FsType: FileSystem>(
        file_system: &FsType,
        path: &str,
    )
    -> Result<DigestFactory, ReadWriteError>
    {
        let mut entries = file_system.list_dir(path).map_err(ReadWriteError::SystemError)?;
        entries.sort();

        let mut factory = DigestFactory::from_str(&entries.join("\n"));
        for entry in entries
        {
            if file_system.is_dir(&entry)
            {
                let mut sub = DigestFactory::from_directory(file_system, &entry)?;
                factory.input_digest(&sub.result());
            }
            else if file_system.is_file(&entry)
            {
                let mut sub = DigestFactory::from_file(file_system, &entry)?;
                factory.input_digest(&sub.result());
            }
            else
            {
                return Err(ReadWriteError::SystemError(SystemError::NotFound));
            }
        }

        Ok(factory)
    }
}

/*  Builds the digest stored in the trace for a rule: targets, then
    dependencies, then the action's canonical form, each section
    terminated by a "\n:\n" separator so e.g. a rule with target "a:b" and
    no sources can't collide with one with source "a" target "b". */
pub fn rule_hash(targets: &[String], deps: &[String], action_form: &str) -> Digest
{
    let mut factory = DigestFactory::new();

    for target in targets
    {
        factory.input_str(target);
        factory.input_str("\n");
    }
    factory.input_str("\n:\n");

    for dep in deps
    {
        factory.input_str(dep);
        factory.input_str("\n");
    }
    factory.input_str("\n:\n");

    factory.input_str(action_form);
    factory.input_str("\n:\n");

    factory.result()
}

#[cfg(test)]
mod test
{
    use super::*;

    #[test]
    fn encode_flat_byte_arrays()
    {
        assert_eq!("0000000000000000000000000000000000000000000", encode62(&[0u8; 32]));
        assert_eq!("1Px8WoR5J2acUNJh7gll8MwzwhMy1la1zo6aDWKSJHY", encode62(&[255u8; 32]));
    }

    #[test]
    fn decode_invalid_length()
    {
        assert_eq!(decode62(""), Err(FromHumanReadableError::InvalidLength));
    }

    #[test]
    fn decode_invalid_character()
    {
        assert_eq!(
            decode62("92DWrWRE9D5pbrqNyzR7wO-ASXgV2j8dfuSWxfx6Le0"),
            Err(FromHumanReadableError::InvalidCharacter('-')));
    }

    #[test]
    fn decode_overflow()
    {
        assert_eq!(
            decode62("2Px8WoR5J2acUNJh7gll8MwzwhMy1la1zo6aDWKSJHY"),
            Err(FromHumanReadableError::Overflow));
    }

    #[test]
    fn human_readable_round_trip()
    {
        let digest = DigestFactory::from_str("apples").result();
        let text = digest.human_readable();
        let back = Digest::from_human_readable(&text).unwrap();
        assert_eq!(digest, back);
    }

    #[test]
    fn different_content_different_digest()
    {
        let a = DigestFactory::from_str("alpha").result();
        let b = DigestFactory::from_str("beta").result();
        assert_ne!(a, b);
    }

    #[test]
    fn rule_hash_sensitive_to_each_section()
    {
        let h1 = rule_hash(&["out".to_string()], &["in".to_string()], "cmd");
        let h2 = rule_hash(&["out".to_string()], &["in".to_string()], "cmd2");
        let h3 = rule_hash(&["out".to_string()], &["in2".to_string()], "cmd");
        assert_ne!(h1, h2);
        assert_ne!(h1, h3);
    }
}
