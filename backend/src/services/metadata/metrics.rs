//! Metric catalog
//!
//! Aliases are expression-level (what users literally type), kr_semantics are
//! meaning-level hints consumed by the semantic index. Priority breaks ties
//! between entries matched with equal confidence.

use super::{field, FieldCategory as C, FieldDef, FieldScope as S};

pub static METRICS: &[FieldDef] = &[
    // ------------------ User ------------------
    field(
        "activeUsers",
        "활성 사용자",
        &["사용자", "유저", "방문자", "사람", "명수", "접속자"],
        &["사용자수", "방문자수", "몇명"],
        C::User,
        Some(S::Event),
        5,
    ),
    field(
        "newUsers",
        "신규 사용자",
        &["신규", "새로운"],
        &["신규유저", "첫 방문"],
        C::User,
        Some(S::Event),
        5,
    ),
    field(
        "totalUsers",
        "총 사용자 수",
        &["전체사용자", "누적사용자", "총유저"],
        &["누적", "전체"],
        C::User,
        Some(S::Event),
        3,
    ),
    field(
        "active7DayUsers",
        "7일 활성 사용자",
        &["7일사용자", "7일활성", "최근7일사용자"],
        &["최근7일", "7일간"],
        C::User,
        Some(S::Event),
        4,
    ),
    field(
        "active28DayUsers",
        "28일 활성 사용자",
        &["28일사용자", "28일활성", "최근28일사용자"],
        &["최근28일", "한달간"],
        C::User,
        Some(S::Event),
        3,
    ),
    // ------------------ Traffic ------------------
    field(
        "sessions",
        "세션",
        &["세션", "방문수", "접속", "연결"],
        &["방문횟수", "세션수"],
        C::Traffic,
        Some(S::Event),
        5,
    ),
    field(
        "sessionsPerUser",
        "사용자당 세션수",
        &["유저당세션", "평균세션수"],
        &["사용자평균세션"],
        C::Traffic,
        Some(S::Event),
        4,
    ),
    // ------------------ Page ------------------
    field(
        "screenPageViews",
        "조회수",
        &["조회수", "페이지뷰", "pv"],
        &["페이지뷰", "view"],
        C::Page,
        Some(S::Event),
        5,
    ),
    // ------------------ Engagement ------------------
    field(
        "engagedSessions",
        "참여 세션수",
        &["참여세션"],
        &["참여한 세션"],
        C::Engagement,
        Some(S::Event),
        4,
    ),
    field(
        "engagementRate",
        "참여율",
        &["참여율", "참여비율"],
        &["참여도"],
        C::Engagement,
        Some(S::Event),
        4,
    ),
    field(
        "bounceRate",
        "이탈률",
        &["이탈률", "이탈율", "반송률"],
        &["이탈"],
        C::Engagement,
        Some(S::Event),
        4,
    ),
    field(
        "averageSessionDuration",
        "평균 세션 시간",
        &["평균세션시간", "체류시간"],
        &["머문 시간"],
        C::Engagement,
        Some(S::Event),
        3,
    ),
    // ------------------ Event ------------------
    field(
        "eventCount",
        "이벤트 수",
        &["이벤트수", "이벤트 횟수", "발생횟수"],
        &["이벤트 발생", "몇 번"],
        C::Event,
        Some(S::Event),
        5,
    ),
    field(
        "eventCountPerUser",
        "사용자당 이벤트 수",
        &["유저당이벤트"],
        &["사용자 평균 이벤트"],
        C::Event,
        Some(S::Event),
        3,
    ),
    field(
        "keyEvents",
        "주요 이벤트",
        &["주요이벤트", "핵심이벤트", "전환이벤트"],
        &["전환 수"],
        C::Event,
        Some(S::Event),
        4,
    ),
    // ------------------ Ecommerce (event scope) ------------------
    field(
        "transactions",
        "거래 수",
        &["거래수", "트랜잭션", "주문수"],
        &["거래 건수"],
        C::Ecommerce,
        Some(S::Event),
        4,
    ),
    field(
        "purchaseRevenue",
        "구매 수익",
        &["수익", "매출", "금액", "돈"],
        &["매출", "수익", "revenue"],
        C::Ecommerce,
        Some(S::Event),
        5,
    ),
    field(
        "totalRevenue",
        "총 수익",
        &["총수익", "전체매출"],
        &["총매출", "전체수익"],
        C::Ecommerce,
        Some(S::Event),
        4,
    ),
    field(
        "grossPurchaseRevenue",
        "총 구매 수익",
        &["총구매매출"],
        &["전체 구매 매출"],
        C::Ecommerce,
        Some(S::Event),
        4,
    ),
    field(
        "refundAmount",
        "환불 금액",
        &["환불금액", "환불액"],
        &["환불"],
        C::Ecommerce,
        Some(S::Event),
        3,
    ),
    field("taxAmount", "세금 금액", &["세금"], &["세금 합계"], C::Ecommerce, Some(S::Event), 2),
    field(
        "shippingAmount",
        "배송 금액",
        &["배송비"],
        &["배송 금액"],
        C::Ecommerce,
        Some(S::Event),
        2,
    ),
    field(
        "ecommercePurchases",
        "전자상거래 구매 건수",
        &["이커머스구매", "구매완료수", "구매건수"],
        &["전자상거래 구매"],
        C::Ecommerce,
        Some(S::Event),
        4,
    ),
    field(
        "firstTimePurchasers",
        "최초 구매자 수",
        &["첫구매자", "최초구매자", "신규구매자", "신규후원자", "첫후원자"],
        &["첫 구매 사용자", "신규 후원자"],
        C::Ecommerce,
        Some(S::Event),
        4,
    ),
    field(
        "firstTimePurchaserRate",
        "첫 구매자 비율",
        &["첫구매율", "최초구매율"],
        &["첫 구매 비율"],
        C::Ecommerce,
        Some(S::Event),
        4,
    ),
    field(
        "totalPurchasers",
        "총 구매자 수",
        &["구매자수", "총구매자", "후원자수"],
        &["구매한 사용자", "후원자"],
        C::Ecommerce,
        Some(S::Event),
        4,
    ),
    field(
        "purchaserRate",
        "구매자 비율",
        &["구매자비율", "구매율"],
        &["구매 전환 비율"],
        C::Ecommerce,
        Some(S::Event),
        3,
    ),
    // ------------------ Ecommerce (item scope) ------------------
    field(
        "itemRevenue",
        "상품 수익",
        &["상품매출", "아이템매출", "상품별매출", "제품매출", "상품수익"],
        &["상품 수익", "아이템 매출", "상품별 매출"],
        C::Ecommerce,
        Some(S::Item),
        5,
    ),
    field(
        "grossItemRevenue",
        "총 항목 수익",
        &["상품총수익"],
        &["상품 매출 합계"],
        C::Ecommerce,
        Some(S::Item),
        4,
    ),
    field(
        "itemsPurchased",
        "구매한 상품 수",
        &["구매항목", "구매상품", "상품수", "판매수량"],
        &["상품개수", "몇개샀는지", "많이팔린"],
        C::Ecommerce,
        Some(S::Item),
        4,
    ),
    field(
        "itemRefundAmount",
        "상품 환불 금액",
        &["상품환불"],
        &["환불금액"],
        C::Ecommerce,
        Some(S::Item),
        3,
    ),
    field(
        "itemsViewed",
        "조회된 상품 수",
        &["상품조회", "조회상품"],
        &["상품 상세조회"],
        C::Ecommerce,
        Some(S::Item),
        3,
    ),
];
