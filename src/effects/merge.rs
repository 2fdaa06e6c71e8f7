//! Merge: stack the inputs bottom to top with source-over.

use super::ApplyContext;
use crate::core::buffer::{AlphaRepresentation, PixelBuffer};
use crate::core::draw::{draw, CompositeOperator};

pub(crate) fn apply(ctx: &ApplyContext<'_>) -> PixelBuffer {
    let mut out = ctx.transparent(AlphaRepresentation::Premultiplied);
    for index in 0..ctx.inputs.len() {
        let layer = ctx.input_premultiplied(index);
        draw(&mut out, &layer, 0, 0, CompositeOperator::SourceOver);
    }
    out
}
