/// Holds a Marker packet.
///
/// The body of a marker packet is always "PGP".  Implementations
/// ignore it.  See [Section 5.8 of RFC 4880] for details.
///
///   [Section 5.8 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.8
#[derive(PartialEq, Eq, Hash, Clone, Debug, Default)]
pub struct Marker(());

impl Marker {
    pub(crate) const BODY: &'static [u8] = b"PGP";
}
