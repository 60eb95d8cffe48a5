use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Luma};
use qrcode::QrCode;

const WA_ME: &str = "https://wa.me/";
const INQUIRY_PHRASE: &str = "Me gustaría obtener información sobre la propiedad ubicada en";

#[derive(Debug, thiserror::Error)]
pub enum QrError {
    #[error("qr payload cannot be encoded: {0}")]
    Encode(#[from] qrcode::types::QrError),
    #[error("qr image cannot be written: {0}")]
    Image(#[from] image::ImageError),
}

/// Text prefilled in the buyer's WhatsApp when scanning a listing QR.
pub fn property_inquiry_message(address: &str) -> String {
    format!("¡Hola! 🏠 {INQUIRY_PHRASE} {}", address.trim())
}

/// Address quoted in a property-inquiry text, if the text carries the inquiry phrase.
pub fn inquiry_address(text: &str) -> Option<String> {
    let start = text.find(INQUIRY_PHRASE)? + INQUIRY_PHRASE.len();
    let address = text[start..]
        .trim()
        .trim_end_matches(|ch: char| matches!(ch, '.' | '!' | '?' | ','))
        .trim();
    (!address.is_empty()).then(|| address.to_string())
}

/// `https://wa.me/<digits>?text=<encoded>`; the text part is omitted when empty.
pub fn whatsapp_link(phone: &str, message: Option<&str>) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    match message.filter(|text| !text.is_empty()) {
        Some(text) => format!("{WA_ME}{digits}?text={}", urlencoding::encode(text)),
        None => format!("{WA_ME}{digits}"),
    }
}

/// Renders `data` as a black-on-white PNG with a quiet zone.
pub fn render_png(data: &str) -> Result<Vec<u8>, QrError> {
    let code = QrCode::new(data.as_bytes())?;
    let rendered = code
        .render::<Luma<u8>>()
        .module_dimensions(10, 10)
        .quiet_zone(true)
        .build();

    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(rendered).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inquiry_round_trips_address() {
        let text = property_inquiry_message(" Calle 123 #45-67 ");
        assert_eq!(inquiry_address(&text).as_deref(), Some("Calle 123 #45-67"));
        assert_eq!(inquiry_address("Hola, quiero vender mi casa"), None);
        assert_eq!(
            inquiry_address(&format!("{INQUIRY_PHRASE}  ")),
            None,
            "phrase without an address carries nothing"
        );
    }

    #[test]
    fn link_keeps_only_digits_and_encodes_text() {
        assert_eq!(
            whatsapp_link("+57 310-555 0000", Some("hola mundo")),
            "https://wa.me/573105550000?text=hola%20mundo"
        );
        assert_eq!(whatsapp_link("57310", None), "https://wa.me/57310");
    }

    #[test]
    fn renders_png_signature() {
        let png = render_png(&whatsapp_link("57310", Some("hola"))).expect("qr renders");
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
