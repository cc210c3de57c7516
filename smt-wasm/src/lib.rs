use smt_core::{
    parse_phrase_table, parse_plaintext, suggested_iterations, write_moses, DecoderConfig, Direction, StackDecoder,
    Symmetrizer, TrainOptions,
};
use wasm_bindgen::prelude::*;

fn to_js<E: std::fmt::Display>(e: E) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Train both directions on the corpus and return its symmetrized links in
/// Moses format. Zero iterations means "pick from the corpus size".
#[wasm_bindgen]
pub fn symmetrize_plaintext(source_text: &str, target_text: &str, it1: usize, it2: usize) -> Result<String, JsValue> {
    let corpus = parse_plaintext(source_text, target_text).map_err(to_js)?;
    let (approx_it1, approx_it2) = suggested_iterations(corpus.len());
    let opts = TrainOptions::with_iterations(
        if it1 > 0 { it1 } else { approx_it1 },
        if it2 > 0 { it2 } else { approx_it2 },
    );
    let symmetrizer = Symmetrizer::train(&corpus, &opts);
    let merged = symmetrizer.symmetrize_corpus(&corpus).map_err(to_js)?;
    write_moses(&merged).map_err(to_js)
}

/// Decode every line of `input_text` against a phrase table in
/// `source ||| target ||| forward backward` format.
#[wasm_bindgen]
pub fn decode_plaintext(
    phrase_table: &str,
    input_text: &str,
    beam_size: usize,
    reverse: bool,
) -> Result<String, JsValue> {
    let table = parse_phrase_table(phrase_table).map_err(to_js)?;
    let direction = if reverse { Direction::TargetToSource } else { Direction::SourceToTarget };
    let config = DecoderConfig {
        beam_size,
        ..Default::default()
    };
    let decoder = StackDecoder::new(table.directed(direction), config);
    let mut out = String::new();
    for line in input_text.lines() {
        let words: Vec<&str> = line.split_whitespace().collect();
        if !words.is_empty() {
            let decoding = decoder.decode(&words).map_err(to_js)?;
            if let Some(best) = decoding.best_translation() {
                out.push_str(&best.join(" "));
            }
        }
        out.push('\n');
    }
    Ok(out)
}
