//! Signed 18-decimal natural logarithm and exponential.
//!
//! Both functions reproduce the rational approximations used on chain bit
//! for bit, so every intermediate step wraps exactly like the EVM would.

use crate::error::MathError;
use crate::math::bit_math::most_significant_bit;
use alloy_primitives::{I256, U256};

const fn int(v: u128) -> I256 {
    I256::from_raw(U256::from_limbs([v as u64, (v >> 64) as u64, 0, 0]))
}

const fn int_limbs(limbs: [u64; 4]) -> I256 {
    I256::from_raw(U256::from_limbs(limbs))
}

/// `exp(x)` rounds to zero for `x <= -EXP_LOWER_BOUND`.
const EXP_LOWER_BOUND: I256 = int(42_139_678_854_452_767_551);
/// `exp(x)` no longer fits an `I256` for `x >= EXP_UPPER_BOUND`.
const EXP_UPPER_BOUND: I256 = int(135_305_999_368_893_231_589);

const FIVE_POW_18: I256 = int(3_814_697_265_625);
const LN2_Q96: I256 = int(54_916_777_467_707_473_351_141_471_128);
const HALF_Q96: I256 = int(1 << 95);

const EXP_Y0: I256 = int(1_346_386_616_545_796_478_920_950_773_328);
const EXP_Y1: I256 = int(57_155_421_227_552_351_082_224_309_758_442);
const EXP_P0: I256 = int(94_201_549_194_550_492_254_356_042_504_812);
const EXP_P1: I256 = int(28_719_021_644_029_726_153_956_944_680_412_240);
// 4385272521454847904659076985693276 << 96
const EXP_P2: I256 = int_limbs([0x0, 0x3b2ca45c00000000, 0xebba824c98fb31b8, 0xd835]);
const EXP_Q0: I256 = int(2_855_989_394_907_223_263_936_484_059_900);
const EXP_Q1: I256 = int(50_020_603_652_535_783_019_961_831_881_945);
const EXP_Q2: I256 = int(533_845_033_583_426_703_283_633_433_725_380);
const EXP_Q3: I256 = int(3_604_857_256_930_695_427_073_651_918_091_429);
const EXP_Q4: I256 = int(14_423_608_567_350_463_180_887_372_962_807_573);
const EXP_Q5: I256 = int(26_449_188_498_355_588_339_934_803_723_976_023);
const EXP_SCALE: U256 = U256::from_limbs([
    0xee70ef65f9978af3,
    0x63c32e5c2f6dc192,
    0x29d9dc385,
    0x0,
]);

const LN_P0: I256 = int(3_273_285_459_638_523_848_632_254_066_296);
const LN_P1: I256 = int(24_828_157_081_833_163_892_658_089_445_524);
const LN_P2: I256 = int(43_456_485_725_739_037_958_740_375_743_393);
const LN_P3: I256 = int(11_111_509_109_440_967_052_023_855_526_967);
const LN_P4: I256 = int(45_023_709_667_254_063_763_336_534_515_857);
const LN_P5: I256 = int(14_706_773_417_378_608_786_704_636_184_526);
// 795164235651350426258249787498 << 96
const LN_P6: I256 = int_limbs([0x0, 0xe71ea86a00000000, 0x9507084cc699bb0, 0xa]);
const LN_Q0: I256 = int(5_573_035_233_440_673_466_300_451_813_936);
const LN_Q1: I256 = int(71_694_874_799_317_883_764_090_561_454_958);
const LN_Q2: I256 = int(283_447_036_172_924_575_727_196_451_306_956);
const LN_Q3: I256 = int(401_686_690_394_027_663_651_624_208_769_553);
const LN_Q4: I256 = int(204_048_457_590_392_012_362_485_061_816_622);
const LN_Q5: I256 = int(31_853_899_698_501_571_402_653_359_427_138);
const LN_Q6: I256 = int(909_429_971_244_387_300_277_376_558_375);
const LN_SCALE: I256 = int_limbs([0x5cef59f0815a5506, 0xdaa0d5f769dba191, 0x1340, 0x0]);
const LN_K: I256 = int_limbs([
    0xd803ae7b6687f2b3,
    0x7614a3f75373f047,
    0xb3975ab3ee5b203a,
    0x267a36c0c95,
]);
const LN_OFFSET: I256 = int_limbs([
    0xe8028c72b8864284,
    0x356a1b7863008a5a,
    0x7177eebf7cd370a3,
    0x57115e47018c,
]);

#[inline(always)]
fn mul_q96(a: I256, b: I256) -> I256 {
    a.wrapping_mul(b).asr(96)
}

/// Natural logarithm of an 18-decimal signed value.
///
/// Returns `MathError::NonPositiveLogarithm` for `x <= 0`. The result is
/// accurate to within one unit of the 18th decimal.
pub fn ln(x: I256) -> Result<I256, MathError> {
    if x <= I256::ZERO {
        return Err(MathError::NonPositiveLogarithm);
    }
    let raw = x.into_raw();

    // Reduce the range of x to [1, 2) * 2^96 with ln(2^k * x) = k * ln(2) + ln(x).
    let k = most_significant_bit(raw)? as i64 - 96;
    let x = I256::from_raw((raw << (159 - k) as usize) >> 159usize);

    // Evaluate using a (8, 8)-term rational approximation.
    let mut p = x.wrapping_add(LN_P0);
    p = mul_q96(p, x).wrapping_add(LN_P1);
    p = mul_q96(p, x).wrapping_add(LN_P2);
    p = mul_q96(p, x).wrapping_sub(LN_P3);
    p = mul_q96(p, x).wrapping_sub(LN_P4);
    p = mul_q96(p, x).wrapping_sub(LN_P5);
    p = p.wrapping_mul(x).wrapping_sub(LN_P6);

    // q has no zeros in the domain and is left in Q96 form.
    let mut q = x.wrapping_add(LN_Q0);
    q = mul_q96(q, x).wrapping_add(LN_Q1);
    q = mul_q96(q, x).wrapping_add(LN_Q2);
    q = mul_q96(q, x).wrapping_add(LN_Q3);
    q = mul_q96(q, x).wrapping_add(LN_Q4);
    q = mul_q96(q, x).wrapping_add(LN_Q5);
    q = mul_q96(q, x).wrapping_add(LN_Q6);

    let mut r = p.checked_div(q).ok_or(MathError::DivisionByZero)?;

    // Finalize: scale by 5^18 * 2^96 / ln(2), add k * ln(2), and the offset
    // that moves the result from base 2^96 to base 1e18.
    let k = I256::try_from(k).map_err(|_| MathError::Overflow)?;
    r = r.wrapping_mul(LN_SCALE);
    r = r.wrapping_add(LN_K.wrapping_mul(k));
    r = r.wrapping_add(LN_OFFSET);
    Ok(r.asr(174))
}

/// `e^x` for an 18-decimal signed exponent.
///
/// Very negative exponents round to zero; exponents whose result would not
/// fit in an `I256` return `MathError::InvalidExponent`.
pub fn exp(x: I256) -> Result<I256, MathError> {
    if x <= EXP_LOWER_BOUND.wrapping_neg() {
        return Ok(I256::ZERO);
    }
    if x >= EXP_UPPER_BOUND {
        return Err(MathError::InvalidExponent);
    }

    // Convert to base 2^96 with a 5^18 / 2^18 scale.
    let mut x = I256::from_raw(x.into_raw() << 78usize).wrapping_div(FIVE_POW_18);

    // Reduce the range of x to (-½ ln 2, ½ ln 2) * 2^96 by factoring out
    // powers of two: exp(x) = exp(x') * 2^k.
    let k = I256::from_raw(x.into_raw() << 96usize)
        .wrapping_div(LN2_Q96)
        .wrapping_add(HALF_Q96)
        .asr(96);
    x = x.wrapping_sub(k.wrapping_mul(LN2_Q96));

    // Evaluate using a (6, 7)-term rational approximation.
    let mut y = x.wrapping_add(EXP_Y0);
    y = mul_q96(y, x).wrapping_add(EXP_Y1);
    let mut p = y.wrapping_add(x).wrapping_sub(EXP_P0);
    p = mul_q96(p, y).wrapping_add(EXP_P1);
    p = p.wrapping_mul(x).wrapping_add(EXP_P2);

    let mut q = x.wrapping_sub(EXP_Q0);
    q = mul_q96(q, x).wrapping_add(EXP_Q1);
    q = mul_q96(q, x).wrapping_sub(EXP_Q2);
    q = mul_q96(q, x).wrapping_add(EXP_Q3);
    q = mul_q96(q, x).wrapping_sub(EXP_Q4);
    q = mul_q96(q, x).wrapping_add(EXP_Q5);

    let r = p.checked_div(q).ok_or(MathError::DivisionByZero)?;

    // r is in (0.09, 0.25) * 2^96. Multiply by the scale factor, apply the
    // 2^k factor and convert from base 2^96 to base 1e18.
    let k = i64::try_from(k).map_err(|_| MathError::Overflow)?;
    let scaled = r.into_raw().wrapping_mul(EXP_SCALE);
    let shift = 195 - k;
    let out = if shift < 256 {
        scaled >> shift as usize
    } else {
        U256::ZERO
    };
    Ok(I256::from_raw(out))
}
