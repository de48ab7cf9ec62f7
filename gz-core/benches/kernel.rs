use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gz_core::{check_win, legal_moves, Board, Move, Stone};

fn midgame_board() -> Board {
    let mut b = Board::new(15);
    let mut x: u64 = 0x5EED;
    for _ in 0..40 {
        x = x.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let r = ((x >> 33) % 15) as i16;
        let c = ((x >> 17) % 15) as i16;
        let s = if x & 1 == 0 { Stone::Black } else { Stone::White };
        b.place(Move::new(r, c), s);
    }
    b
}

fn bench_legal_moves(c: &mut Criterion) {
    let b = midgame_board();
    c.bench_function("legal_moves_r1", |bench| {
        bench.iter(|| legal_moves(black_box(&b), 1))
    });
    c.bench_function("legal_moves_r2", |bench| {
        bench.iter(|| legal_moves(black_box(&b), 2))
    });
}

fn bench_check_win(c: &mut Criterion) {
    let mut b = midgame_board();
    let mv = Move::new(7, 7);
    if b.is_empty_cell(7, 7) {
        b.place(mv, Stone::Black);
    }
    c.bench_function("check_win", |bench| {
        bench.iter(|| check_win(black_box(&b), Stone::Black, mv))
    });
}

criterion_group!(benches, bench_legal_moves, bench_check_win);
criterion_main!(benches);
