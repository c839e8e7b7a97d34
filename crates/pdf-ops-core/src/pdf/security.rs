//! PDF Standard Security Handler, revisions 2 and 3 (RC4).
//!
//! Documents are protected with revision 3, 128-bit keys and every
//! permission granted. Revision 2 (40-bit) input is understood when
//! unlocking. Key material follows ISO 32000-1 §7.6.3:
//!
//! - file key: MD5 over padded password, `O`, `P`, first file id
//! - `O`: RC4 of the padded user password under a key derived from the
//!   owner password
//! - `U`: RC4 of MD5(padding, file id) under the file key
//! - object key: MD5(file key, object number, generation), truncated

use std::fmt;

use lopdf::{Dictionary, Document as Arena, Object, ObjectId, StringFormat};

use super::arcfour::Arcfour;
use crate::error::{Error, Result};

/// Password padding string from the PDF reference.
pub const PASSWORD_PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// `P` value granting every permission.
const PERMIT_ALL: i32 = -4;

/// Revision written by [`StandardSecurity::create`].
const CREATED_REVISION: i64 = 3;

/// Key length in bytes written by [`StandardSecurity::create`].
const CREATED_KEY_BYTES: usize = 16;

/// Parameters of a Standard Security Handler `/Encrypt` dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardSecurity {
    version: i64,
    revision: i64,
    key_bytes: usize,
    owner_hash: Vec<u8>,
    user_hash: Vec<u8>,
    permissions: i32,
    file_id: Vec<u8>,
    encrypt_id: Option<ObjectId>,
}

/// Document-wide encryption key derived from a password.
#[derive(Clone, PartialEq, Eq)]
pub struct FileKey(Vec<u8>);

impl fmt::Debug for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileKey({} bytes)", self.0.len())
    }
}

impl FileKey {
    /// Key for one indirect object: MD5 over the file key, the low three
    /// bytes of the object number and the low two of the generation,
    /// truncated to `min(n + 5, 16)` bytes.
    fn object_key(&self, (number, generation): ObjectId) -> Vec<u8> {
        let mut context = md5::Context::new();
        context.consume(&self.0);
        context.consume(&number.to_le_bytes()[..3]);
        context.consume(generation.to_le_bytes());
        let digest = context.compute();
        let len = (self.0.len() + 5).min(16);
        digest.0[..len].to_vec()
    }

    /// Encrypt or decrypt `data` belonging to object `id`.
    pub fn crypt(&self, id: ObjectId, data: &[u8]) -> Vec<u8> {
        Arcfour::apply(&self.object_key(id), data)
    }
}

impl StandardSecurity {
    /// New revision 3 handler whose owner password equals `password`.
    pub fn create(password: &str, file_id: Vec<u8>) -> (Self, FileKey) {
        Self::with_passwords(password.as_bytes(), password.as_bytes(), file_id)
    }

    fn with_passwords(user: &[u8], owner: &[u8], file_id: Vec<u8>) -> (Self, FileKey) {
        let owner_hash = owner_hash(owner, user, CREATED_REVISION, CREATED_KEY_BYTES);
        let mut handler = Self {
            version: 2,
            revision: CREATED_REVISION,
            key_bytes: CREATED_KEY_BYTES,
            owner_hash,
            user_hash: Vec::new(),
            permissions: PERMIT_ALL,
            file_id,
            encrypt_id: None,
        };
        let key = handler.file_key(user);
        handler.user_hash = handler.user_hash_for(&key);
        (handler, key)
    }

    /// Read an `/Encrypt` dictionary.
    ///
    /// Only `/Filter /Standard` with V 0..=2 and R 2..=3 is understood.
    pub fn from_encrypt_dict(
        dict: &Dictionary,
        file_id: Vec<u8>,
        encrypt_id: Option<ObjectId>,
    ) -> Result<Self> {
        let filter = match dict.get(b"Filter") {
            Ok(Object::Name(name)) => name.clone(),
            _ => b"(none)".to_vec(),
        };
        if filter != b"Standard" {
            return Err(Error::UnsupportedSecurity(format!(
                "filter {}",
                String::from_utf8_lossy(&filter)
            )));
        }

        let version = integer(dict, b"V").unwrap_or(0);
        let revision = integer(dict, b"R")
            .ok_or_else(|| Error::MalformedDocument("encrypt dictionary without /R".into()))?;
        if !(0..=2).contains(&version) || !(2..=3).contains(&revision) {
            return Err(Error::UnsupportedSecurity(format!("V{version} R{revision}")));
        }

        let length_bits = integer(dict, b"Length").unwrap_or(40).clamp(40, 128);
        let key_bytes = if revision == 2 {
            5
        } else {
            usize::try_from(length_bits / 8).unwrap_or(5)
        };

        let owner_hash = string(dict, b"O")?;
        let user_hash = string(dict, b"U")?;
        #[allow(clippy::cast_possible_truncation)]
        let permissions = integer(dict, b"P")
            .ok_or_else(|| Error::MalformedDocument("encrypt dictionary without /P".into()))?
            as i32;

        Ok(Self {
            version,
            revision,
            key_bytes,
            owner_hash,
            user_hash,
            permissions,
            file_id,
            encrypt_id,
        })
    }

    /// The `/Encrypt` dictionary describing this handler.
    pub fn encrypt_dictionary(&self) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.set("Filter", Object::Name(b"Standard".to_vec()));
        dict.set("V", Object::Integer(self.version));
        dict.set("R", Object::Integer(self.revision));
        #[allow(clippy::cast_possible_wrap)]
        dict.set("Length", Object::Integer((self.key_bytes * 8) as i64));
        dict.set(
            "O",
            Object::String(self.owner_hash.clone(), StringFormat::Hexadecimal),
        );
        dict.set(
            "U",
            Object::String(self.user_hash.clone(), StringFormat::Hexadecimal),
        );
        dict.set("P", Object::Integer(i64::from(self.permissions)));
        dict
    }

    /// Try `password` as user password, then as owner password.
    pub fn authenticate(&self, password: &str) -> Option<FileKey> {
        let password = password.as_bytes();
        self.authenticate_user(password)
            .or_else(|| self.authenticate_owner(password))
    }

    fn authenticate_user(&self, password: &[u8]) -> Option<FileKey> {
        let key = self.file_key(password);
        let expected = self.user_hash_for(&key);
        let matches = if self.revision == 2 {
            expected == self.user_hash
        } else {
            self.user_hash.len() >= 16 && expected[..16] == self.user_hash[..16]
        };
        matches.then_some(key)
    }

    fn authenticate_owner(&self, password: &[u8]) -> Option<FileKey> {
        let rc4_key = owner_rc4_key(password, self.revision, self.key_len());
        let user_password = if self.revision == 2 {
            Arcfour::apply(&rc4_key, &self.owner_hash)
        } else {
            (0..20u8).rev().fold(self.owner_hash.clone(), |data, round| {
                Arcfour::apply(&xor_key(&rc4_key, round), &data)
            })
        };
        self.authenticate_user(&user_password)
    }

    /// Algorithm 2: file key from a password.
    fn file_key(&self, password: &[u8]) -> FileKey {
        let n = self.key_len();
        let mut context = md5::Context::new();
        context.consume(pad(password));
        context.consume(&self.owner_hash);
        context.consume(self.permissions.to_le_bytes());
        context.consume(&self.file_id);
        let mut digest = context.compute().0;
        if self.revision >= 3 {
            for _ in 0..50 {
                digest = md5::compute(&digest[..n]).0;
            }
        }
        FileKey(digest[..n].to_vec())
    }

    /// Algorithms 4 and 5: the `U` value for a file key.
    fn user_hash_for(&self, key: &FileKey) -> Vec<u8> {
        if self.revision == 2 {
            return Arcfour::apply(&key.0, &PASSWORD_PADDING);
        }
        let mut context = md5::Context::new();
        context.consume(PASSWORD_PADDING);
        context.consume(&self.file_id);
        let digest = context.compute();
        let mut hash = (0..20u8).fold(digest.0.to_vec(), |data, round| {
            Arcfour::apply(&xor_key(&key.0, round), &data)
        });
        hash.extend_from_slice(&PASSWORD_PADDING[..16]);
        hash
    }

    fn key_len(&self) -> usize {
        if self.revision == 2 { 5 } else { self.key_bytes.clamp(5, 16) }
    }

    pub const fn revision(&self) -> i64 {
        self.revision
    }

    pub const fn key_length_bits(&self) -> usize {
        self.key_bytes * 8
    }

    pub const fn permissions(&self) -> i32 {
        self.permissions
    }

    pub fn file_id(&self) -> &[u8] {
        &self.file_id
    }

    /// Id of the indirect `/Encrypt` object, if the dictionary is indirect.
    pub const fn encrypt_id(&self) -> Option<ObjectId> {
        self.encrypt_id
    }

    pub(crate) const fn set_encrypt_id(&mut self, id: ObjectId) {
        self.encrypt_id = Some(id);
    }
}

/// Encrypt every string and stream in the arena in place.
///
/// Must run before the `/Encrypt` object is added.
pub(crate) fn encrypt_objects(arena: &mut Arena, key: &FileKey) {
    for (&id, object) in &mut arena.objects {
        crypt_object(key, id, object);
    }
}

/// Decrypt every string and stream in the arena in place, leaving the
/// `/Encrypt` object and cross-reference streams untouched.
pub(crate) fn decrypt_objects(arena: &mut Arena, key: &FileKey, encrypt_id: Option<ObjectId>) {
    for (&id, object) in &mut arena.objects {
        if Some(id) == encrypt_id || is_xref_stream(object) {
            continue;
        }
        crypt_object(key, id, object);
    }
}

fn crypt_object(key: &FileKey, id: ObjectId, object: &mut Object) {
    match object {
        Object::String(bytes, format) => {
            *bytes = key.crypt(id, bytes);
            // literal strings may have their line endings normalized by readers
            *format = StringFormat::Hexadecimal;
        }
        Object::Array(items) => {
            for item in items {
                crypt_object(key, id, item);
            }
        }
        Object::Dictionary(dict) => crypt_dictionary(key, id, dict),
        Object::Stream(stream) => {
            crypt_dictionary(key, id, &mut stream.dict);
            stream.content = key.crypt(id, &stream.content);
        }
        _ => {}
    }
}

fn crypt_dictionary(key: &FileKey, id: ObjectId, dict: &mut Dictionary) {
    for (_, value) in dict.iter_mut() {
        crypt_object(key, id, value);
    }
}

fn is_xref_stream(object: &Object) -> bool {
    matches!(
        object,
        Object::Stream(stream) if matches!(stream.dict.get(b"Type"), Ok(Object::Name(name)) if name == b"XRef")
    )
}

/// Algorithm 3 step (a)-(d): RC4 key from the owner password.
fn owner_rc4_key(owner: &[u8], revision: i64, n: usize) -> Vec<u8> {
    let mut digest = md5::compute(pad(owner)).0;
    if revision >= 3 {
        for _ in 0..50 {
            digest = md5::compute(digest).0;
        }
    }
    digest[..n.min(16)].to_vec()
}

/// Algorithm 3: the `O` value.
fn owner_hash(owner: &[u8], user: &[u8], revision: i64, n: usize) -> Vec<u8> {
    let key = owner_rc4_key(owner, revision, n);
    let first = Arcfour::apply(&key, &pad(user));
    if revision < 3 {
        return first;
    }
    (1..20u8).fold(first, |data, round| {
        Arcfour::apply(&xor_key(&key, round), &data)
    })
}

fn xor_key(key: &[u8], round: u8) -> Vec<u8> {
    key.iter().map(|b| b ^ round).collect()
}

fn pad(password: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    padded[len..].copy_from_slice(&PASSWORD_PADDING[..32 - len]);
    padded
}

fn integer(dict: &Dictionary, key: &[u8]) -> Option<i64> {
    match dict.get(key) {
        Ok(Object::Integer(value)) => Some(*value),
        _ => None,
    }
}

fn string(dict: &Dictionary, key: &[u8]) -> Result<Vec<u8>> {
    match dict.get(key) {
        Ok(Object::String(bytes, _)) => Ok(bytes.clone()),
        _ => Err(Error::MalformedDocument(format!(
            "encrypt dictionary without /{}",
            String::from_utf8_lossy(key)
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    // rc4-128.pdf from the pdfminer.six encryption fixtures, password "foo"
    const RC4_128_O: [u8; 32] = [
        208, 72, 209, 82, 158, 83, 93, 24, 132, 205, 56, 86, 54, 123, 24, 75, 74, 144, 223, 1,
        230, 55, 209, 110, 202, 6, 91, 175, 78, 100, 144, 11,
    ];
    const RC4_128_U: [u8; 32] = [
        9, 52, 18, 54, 59, 157, 50, 124, 122, 197, 1, 68, 199, 199, 85, 241, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0, 0,
    ];
    // rc4-40.pdf, same password
    const RC4_40_O: [u8; 32] = [
        1, 169, 240, 206, 242, 141, 0, 248, 223, 176, 37, 143, 94, 240, 197, 92, 157, 247, 200,
        22, 149, 143, 54, 49, 0, 175, 119, 236, 2, 38, 36, 84,
    ];
    const RC4_40_U: [u8; 32] = [
        105, 75, 157, 162, 248, 9, 199, 124, 114, 119, 140, 251, 202, 194, 4, 129, 178, 114, 5,
        208, 231, 211, 34, 98, 54, 130, 131, 100, 102, 106, 151, 8,
    ];
    const DOC_ID: [u8; 16] = [
        101, 26, 148, 254, 235, 120, 104, 211, 18, 169, 123, 55, 114, 112, 134, 14,
    ];

    fn encrypt_dict(v: i64, r: i64, length: i64, o: &[u8], u: &[u8]) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.set("Filter", Object::Name(b"Standard".to_vec()));
        dict.set("V", Object::Integer(v));
        dict.set("R", Object::Integer(r));
        dict.set("Length", Object::Integer(length));
        dict.set("P", Object::Integer(-4));
        dict.set("O", Object::String(o.to_vec(), StringFormat::Literal));
        dict.set("U", Object::String(u.to_vec(), StringFormat::Literal));
        dict
    }

    #[test]
    fn test_rc4_128_known_vector() {
        let dict = encrypt_dict(2, 3, 128, &RC4_128_O, &RC4_128_U);
        let handler = StandardSecurity::from_encrypt_dict(&dict, DOC_ID.to_vec(), None).unwrap();
        assert_eq!(handler.key_length_bits(), 128);
        assert!(handler.authenticate("foo").is_some());
        assert!(handler.authenticate("bar").is_none());
        assert!(handler.authenticate("").is_none());
    }

    #[test]
    fn test_rc4_40_known_vector() {
        let dict = encrypt_dict(1, 2, 40, &RC4_40_O, &RC4_40_U);
        let handler = StandardSecurity::from_encrypt_dict(&dict, DOC_ID.to_vec(), None).unwrap();
        assert!(handler.authenticate("foo").is_some());
        assert!(handler.authenticate("wrong").is_none());
    }

    #[test]
    fn test_create_then_authenticate() {
        let (handler, key) = StandardSecurity::create("foo", DOC_ID.to_vec());
        assert_eq!(handler.revision(), 3);
        assert_eq!(handler.permissions(), -4);
        assert_eq!(handler.authenticate("foo"), Some(key));
    }

    #[test]
    fn test_owner_password_unlocks() {
        let (handler, user_key) =
            StandardSecurity::with_passwords(b"reader", b"admin", DOC_ID.to_vec());
        assert_eq!(handler.authenticate("admin"), Some(user_key.clone()));
        assert_eq!(handler.authenticate("reader"), Some(user_key));
        assert!(handler.authenticate("guest").is_none());
    }

    #[test]
    fn test_encrypt_dictionary_round_trips() {
        let (handler, _) = StandardSecurity::create("secret", vec![7; 16]);
        let dict = handler.encrypt_dictionary();
        let parsed = StandardSecurity::from_encrypt_dict(&dict, vec![7; 16], None).unwrap();
        assert_eq!(parsed, handler);
        assert!(parsed.authenticate("secret").is_some());
    }

    #[test]
    fn test_unsupported_handler() {
        let mut dict = encrypt_dict(4, 4, 128, &RC4_128_O, &RC4_128_U);
        let err = StandardSecurity::from_encrypt_dict(&dict, DOC_ID.to_vec(), None).unwrap_err();
        assert!(matches!(err, Error::UnsupportedSecurity(_)));

        dict.set("Filter", Object::Name(b"Adobe.PubSec".to_vec()));
        let err = StandardSecurity::from_encrypt_dict(&dict, DOC_ID.to_vec(), None).unwrap_err();
        assert!(matches!(err, Error::UnsupportedSecurity(_)));
    }

    #[test]
    fn test_object_crypt_is_symmetric_and_keyed_per_object() {
        let (_, key) = StandardSecurity::create("pw", vec![1; 16]);
        let plain = b"BT /F1 12 Tf (hello) Tj ET";
        let a = key.crypt((4, 0), plain);
        let b = key.crypt((5, 0), plain);
        assert_ne!(a, b);
        assert_eq!(key.crypt((4, 0), &a), plain);
    }

    #[test]
    fn test_crypt_object_rewrites_strings_as_hex() {
        let (_, key) = StandardSecurity::create("pw", vec![1; 16]);
        let mut object = Object::Array(vec![
            Object::String(b"title".to_vec(), StringFormat::Literal),
            Object::Integer(3),
        ]);
        crypt_object(&key, (9, 0), &mut object);
        let Object::Array(items) = &object else { panic!("array expected") };
        let Object::String(cipher, format) = &items[0] else { panic!("string expected") };
        assert_eq!(*format, StringFormat::Hexadecimal);
        assert_eq!(key.crypt((9, 0), cipher), b"title");
        assert!(matches!(items[1], Object::Integer(3)));
    }
}
